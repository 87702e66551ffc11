//! Inventory decrement strategies
//!
//! Three interchangeable answers to "take one unit of stock":
//!
//! - [`UnprotectedStrategy`]: plain read, sleep, write. Oversells under
//!   concurrency and is kept as the control case.
//! - [`PessimisticStrategy`]: exclusive row lock for the whole unit of work.
//! - [`GatedStrategy`]: atomic fast-counter gate first, ledger write second,
//!   compensating increment if the ledger write fails.
//!
//! All three share [`PurchaseStrategy::purchase`], which validates the raw
//! request, times the attempt and records the outcome in the injected
//! [`StatsAggregator`]. An attempt never retries internally.

mod gated;
mod pessimistic;
mod unprotected;

pub use gated::GatedStrategy;
pub use pessimistic::PessimisticStrategy;
pub use unprotected::UnprotectedStrategy;

use crate::application::stats::StatsAggregator;
use crate::domain::{
    PurchaseError, PurchaseOutcome, PurchaseRequest, RawPurchaseRequest, StrategyKind,
};
use crate::infrastructure::{LedgerError, LedgerUnit};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{error, warn};

#[async_trait]
pub trait PurchaseStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn stats(&self) -> &StatsAggregator;

    /// Run the decrement algorithm for an already validated request
    async fn attempt(&self, request: PurchaseRequest) -> Result<(), PurchaseError>;

    /// Validate, attempt, and record one purchase
    async fn purchase(&self, raw: RawPurchaseRequest) -> PurchaseOutcome {
        let started = Instant::now();
        let stats = self.stats();
        stats.record_attempt();

        let result = match PurchaseRequest::try_from(raw) {
            Ok(request) => self.attempt(request).await,
            Err(err) => Err(err),
        };
        let latency = started.elapsed();

        match result {
            Ok(()) => {
                stats.record_success(latency);
                PurchaseOutcome::success(self.kind(), latency)
            }
            Err(err) => {
                stats.record_failure();
                if err.is_fault() {
                    error!(strategy = %self.kind(), error = %err, "Purchase aborted");
                } else {
                    warn!(strategy = %self.kind(), error = %err, "Purchase rejected");
                }
                PurchaseOutcome::failed(self.kind(), err, latency)
            }
        }
    }
}

pub(crate) fn store_unavailable(err: LedgerError) -> PurchaseError {
    PurchaseError::StoreUnavailable(err.to_string())
}

/// Roll `unit` back and hand `err` on to the caller
///
/// A failed rollback is only logged; the backend discards the unit either way.
pub(crate) async fn abort(unit: Box<dyn LedgerUnit>, err: PurchaseError) -> PurchaseError {
    if let Err(rollback_err) = unit.rollback().await {
        warn!(error = %rollback_err, "Rollback failed");
    }
    err
}
