//! Validated newtypes for inventory identifiers and tuning values
//!
//! Raw integers arrive from JSON bodies, configuration files and the load
//! harness. Wrapping them here keeps malformed values from ever reaching the
//! ledger or the fast counter.

use nutype::nutype;
use std::time::Duration;

/// Identifier of a product row in the stock ledger
///
/// Ledger identifiers are assigned by a SERIAL column, so they start at 1.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        Display,
        AsRef
    )
)]
pub struct ProductId(i32);

/// Identifier of the user placing an order
///
/// Load generators use the attempt index as the user id, so zero is valid.
#[nutype(
    validate(greater_or_equal = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        Display,
        AsRef
    )
)]
pub struct UserId(i32);

/// Initial stock a product is seeded with and restored to on reset
#[nutype(
    validate(greater_or_equal = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        Display,
        AsRef,
        Default
    ),
    default = 100
)]
pub struct Capacity(i64);

impl Capacity {
    pub fn units(&self) -> i64 {
        self.into_inner()
    }
}

/// Artificial read-then-write delay used by the unprotected strategy
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRef,
    From
))]
pub struct DelayMillis(u64);

impl DelayMillis {
    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

impl Default for DelayMillis {
    fn default() -> Self {
        Self::new(5)
    }
}
