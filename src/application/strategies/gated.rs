//! Cache-gated decrement
//!
//! The fast counter admits at most as many attempts as it holds stock, in one
//! indivisible step per attempt. Losers are rejected without ever touching the
//! ledger; only winners open a unit of work. If any ledger step fails after the
//! gate admitted the attempt, the reservation is handed back with a single
//! compensating increment.
//!
//! If that increment also fails, the cache stays one unit low relative to the
//! ledger until the next explicit cache sync. This is logged and not retried.

use super::{abort, store_unavailable, PurchaseStrategy};
use crate::application::stats::StatsAggregator;
use crate::domain::{CacheKey, OrderStatus, PurchaseError, PurchaseRequest, StrategyKind};
use crate::infrastructure::{FastCounter, StockLedger, GATE_UNAVAILABLE};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, warn};

pub struct GatedStrategy {
    ledger: Arc<dyn StockLedger>,
    counter: Arc<dyn FastCounter>,
    stats: Arc<StatsAggregator>,
}

impl GatedStrategy {
    pub fn new(
        ledger: Arc<dyn StockLedger>,
        counter: Arc<dyn FastCounter>,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            ledger,
            counter,
            stats,
        }
    }

    async fn persist(&self, request: PurchaseRequest) -> Result<(), PurchaseError> {
        let mut unit = self.ledger.begin_unit().await.map_err(store_unavailable)?;

        if let Err(err) = unit.decrement_quantity(request.product_id).await {
            return Err(abort(unit, store_unavailable(err)).await);
        }
        if let Err(err) = unit
            .insert_order(request.user_id, request.product_id, OrderStatus::Success)
            .await
        {
            return Err(abort(unit, store_unavailable(err)).await);
        }

        unit.commit()
            .await
            .map_err(|err| PurchaseError::CommitFailed(err.to_string()))
    }

    async fn compensate(&self, key: &CacheKey) {
        match self.counter.increment(key).await {
            Ok(restored) => warn!(%key, restored, "Returned gated reservation to cache"),
            Err(err) => error!(
                %key,
                error = %err,
                "Compensation failed; cache and ledger diverge until the next sync"
            ),
        }
    }
}

#[async_trait]
impl PurchaseStrategy for GatedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CacheGated
    }

    fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    async fn attempt(&self, request: PurchaseRequest) -> Result<(), PurchaseError> {
        let key = CacheKey::for_product(request.product_id);

        let remaining = self
            .counter
            .atomic_test_and_decrement(&key)
            .await
            .map_err(|err| PurchaseError::StoreUnavailable(err.to_string()))?;
        if remaining == GATE_UNAVAILABLE {
            return Err(PurchaseError::OutOfStock);
        }

        if let Err(err) = self.persist(request).await {
            self.compensate(&key).await;
            return Err(err);
        }
        Ok(())
    }
}
