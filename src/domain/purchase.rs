//! Purchase requests, outcomes and the per-attempt error taxonomy

use super::types::{ProductId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// The three interchangeable decrement strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Read, sleep, write. No concurrency control at all.
    Unprotected,
    /// Exclusive row lock held for the whole unit of work
    PessimisticLocked,
    /// Atomic fast-counter gate in front of the ledger
    CacheGated,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Unprotected,
        StrategyKind::PessimisticLocked,
        StrategyKind::CacheGated,
    ];

    /// Name reported back to API clients in the `mode` field
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Unprotected => "naive",
            Self::PessimisticLocked => "postgres_lock",
            Self::CacheGated => "redis_postgres",
        }
    }

    /// Path segment under `/purchase/` that selects this strategy
    pub fn route_segment(&self) -> &'static str {
        match self {
            Self::Unprotected => "naive",
            Self::PessimisticLocked => "postgres",
            Self::CacheGated => "redis",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route_segment())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown purchase mode: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "naive" | "unprotected" => Ok(Self::Unprotected),
            "postgres" | "postgres_lock" | "pessimistic" => Ok(Self::PessimisticLocked),
            "redis" | "redis_postgres" | "gated" => Ok(Self::CacheGated),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Purchase request exactly as received, before validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPurchaseRequest {
    pub user_id: i64,
    pub product_id: i64,
}

/// A validated purchase request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub user_id: UserId,
    pub product_id: ProductId,
}

impl TryFrom<RawPurchaseRequest> for PurchaseRequest {
    type Error = PurchaseError;

    fn try_from(raw: RawPurchaseRequest) -> Result<Self, Self::Error> {
        let user_id = i32::try_from(raw.user_id)
            .ok()
            .and_then(|id| UserId::try_new(id).ok())
            .ok_or_else(|| PurchaseError::Validation(format!("user_id {}", raw.user_id)))?;
        let product_id = i32::try_from(raw.product_id)
            .ok()
            .and_then(|id| ProductId::try_new(id).ok())
            .ok_or_else(|| PurchaseError::Validation(format!("product_id {}", raw.product_id)))?;

        Ok(Self {
            user_id,
            product_id,
        })
    }
}

/// Why a single purchase attempt did not succeed
///
/// Every variant is terminal for that attempt. Nothing here is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurchaseError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("out of stock")]
    OutOfStock,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("lock acquisition failed: {0}")]
    LockAcquisitionFailed(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),
}

impl PurchaseError {
    /// Outward result code for this failure
    pub fn status(&self) -> PurchaseStatus {
        match self {
            Self::Validation(_) => PurchaseStatus::ValidationError,
            Self::OutOfStock => PurchaseStatus::OutOfStock,
            Self::StoreUnavailable(_) | Self::LockAcquisitionFailed(_) | Self::CommitFailed(_) => {
                PurchaseStatus::StoreUnavailable
            }
        }
    }

    /// Infrastructure faults, as opposed to expected business outcomes
    pub fn is_fault(&self) -> bool {
        self.status() == PurchaseStatus::StoreUnavailable
    }
}

/// Result code exposed to callers of `purchase`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Success,
    OutOfStock,
    ValidationError,
    StoreUnavailable,
}

/// Terminal outcome of one purchase attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOutcome {
    pub strategy: StrategyKind,
    pub status: PurchaseStatus,
    pub latency: Duration,
    pub error: Option<PurchaseError>,
}

impl PurchaseOutcome {
    pub fn success(strategy: StrategyKind, latency: Duration) -> Self {
        Self {
            strategy,
            status: PurchaseStatus::Success,
            latency,
            error: None,
        }
    }

    pub fn failed(strategy: StrategyKind, error: PurchaseError, latency: Duration) -> Self {
        Self {
            strategy,
            status: error.status(),
            latency,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PurchaseStatus::Success
    }

    pub fn latency_ms(&self) -> u64 {
        u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request_parses() {
        let request = PurchaseRequest::try_from(RawPurchaseRequest {
            user_id: 7,
            product_id: 1,
        })
        .expect("valid request");

        assert_eq!(request.user_id.into_inner(), 7);
        assert_eq!(request.product_id.into_inner(), 1);
    }

    #[test]
    fn test_malformed_requests_are_validation_errors() {
        let cases = [
            RawPurchaseRequest {
                user_id: 1,
                product_id: 0,
            },
            RawPurchaseRequest {
                user_id: -5,
                product_id: 1,
            },
            RawPurchaseRequest {
                user_id: 1,
                product_id: i64::from(i32::MAX) + 1,
            },
        ];

        for raw in cases {
            let err = PurchaseRequest::try_from(raw).expect_err("should be rejected");
            assert_eq!(err.status(), PurchaseStatus::ValidationError);
        }
    }

    #[test]
    fn test_infrastructure_faults_surface_as_store_unavailable() {
        for err in [
            PurchaseError::StoreUnavailable("io".into()),
            PurchaseError::LockAcquisitionFailed("lock".into()),
            PurchaseError::CommitFailed("commit".into()),
        ] {
            assert_eq!(err.status(), PurchaseStatus::StoreUnavailable);
            assert!(err.is_fault());
        }
        assert!(!PurchaseError::OutOfStock.is_fault());
    }

    #[test]
    fn test_strategy_kind_round_trips_through_route_segment() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.route_segment().parse::<StrategyKind>(), Ok(kind));
            assert_eq!(kind.mode_name().parse::<StrategyKind>(), Ok(kind));
        }
        assert!("optimistic".parse::<StrategyKind>().is_err());
    }
}
