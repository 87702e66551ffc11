//! Fast counter: cached stock values with an indivisible test-and-decrement
//!
//! The counter is a derived view of ledger stock and is never authoritative.
//! Its only job is to let the gated strategy reject losing requests without
//! touching the ledger at all.
//!
//! Two backends implement [`FastCounter`]: [`RedisFastCounter`], shared by
//! every server instance pointed at the same Redis, and
//! [`InMemoryFastCounter`], which lives and dies with the process.

pub mod memory;
pub mod redis;

use crate::domain::CacheKey;
use async_trait::async_trait;
use thiserror::Error;

pub use memory::{CounterFault, InMemoryFastCounter};
pub use self::redis::RedisFastCounter;

/// Returned by the gate when the key is absent or its value is already <= 0
pub const GATE_UNAVAILABLE: i64 = -1;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("Fast counter unavailable: {0}")]
    Unavailable(String),
}

/// Capability of an atomic cached-stock store
#[async_trait]
pub trait FastCounter: Send + Sync {
    /// If the value under `key` is present and > 0, decrement it and return the
    /// new value; otherwise return [`GATE_UNAVAILABLE`] without mutating anything.
    async fn atomic_test_and_decrement(&self, key: &CacheKey) -> Result<i64, CounterError>;

    /// Add one, creating the entry at zero first if absent. Returns the new value.
    async fn increment(&self, key: &CacheKey) -> Result<i64, CounterError>;

    async fn set(&self, key: &CacheKey, value: i64) -> Result<(), CounterError>;

    async fn get(&self, key: &CacheKey) -> Result<Option<i64>, CounterError>;
}
