//! Pessimistic decrement: exclusive row lock for the whole unit of work
//!
//! `read_quantity_for_update` is the only point of mutual exclusion. Once it
//! returns, this attempt is the sole holder of the product row until commit or
//! rollback, so no two attempts ever observe the same pre-decrement quantity.

use super::{abort, store_unavailable, PurchaseStrategy};
use crate::application::stats::StatsAggregator;
use crate::domain::{OrderStatus, PurchaseError, PurchaseRequest, StrategyKind};
use crate::infrastructure::StockLedger;
use async_trait::async_trait;
use std::sync::Arc;

pub struct PessimisticStrategy {
    ledger: Arc<dyn StockLedger>,
    stats: Arc<StatsAggregator>,
}

impl PessimisticStrategy {
    pub fn new(ledger: Arc<dyn StockLedger>, stats: Arc<StatsAggregator>) -> Self {
        Self { ledger, stats }
    }
}

#[async_trait]
impl PurchaseStrategy for PessimisticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PessimisticLocked
    }

    fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    async fn attempt(&self, request: PurchaseRequest) -> Result<(), PurchaseError> {
        let mut unit = self.ledger.begin_unit().await.map_err(store_unavailable)?;

        let quantity = match unit.read_quantity_for_update(request.product_id).await {
            Ok(quantity) => quantity,
            Err(err) => {
                let err = PurchaseError::LockAcquisitionFailed(err.to_string());
                return Err(abort(unit, err).await);
            }
        };
        if quantity <= 0 {
            return Err(abort(unit, PurchaseError::OutOfStock).await);
        }

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewProduct, ProductId, PurchaseStatus, RawPurchaseRequest};
    use crate::infrastructure::{InMemoryLedger, LedgerFault};

    fn setup(quantity: i64) -> (InMemoryLedger, Arc<StatsAggregator>, Arc<PessimisticStrategy>) {
        let ledger = InMemoryLedger::new();
        ledger
            .insert_product(&NewProduct::flash_sale_item(quantity))
            .expect("seed");
        let stats = Arc::new(StatsAggregator::new());
        let strategy = PessimisticStrategy::new(Arc::new(ledger.clone()), Arc::clone(&stats));
        (ledger, stats, Arc::new(strategy))
    }

    fn request(user_id: i64) -> RawPurchaseRequest {
        RawPurchaseRequest {
            user_id,
            product_id: 1,
        }
    }

    fn product() -> ProductId {
        ProductId::try_new(1).expect("valid id")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_purchases_never_oversell() {
        let (ledger, stats, strategy) = setup(10);

        let mut tasks = tokio::task::JoinSet::new();
        for user in 0..50 {
            let strategy = Arc::clone(&strategy);
            tasks.spawn(async move { strategy.purchase(request(user)).await });
        }

        let mut out_of_stock = 0;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.expect("join");
            if outcome.status == PurchaseStatus::OutOfStock {
                out_of_stock += 1;
            }
        }

        assert_eq!(out_of_stock, 40);
        assert_eq!(ledger.read_quantity(product()).await.expect("read"), 0);
        assert_eq!(ledger.count_orders(OrderStatus::Success).await.expect("count"), 10);
        assert_eq!(stats.snapshot().success, 10);
    }

    #[tokio::test]
    async fn test_lock_failure_is_reported_and_rolled_back() {
        let (ledger, _stats, strategy) = setup(3);
        ledger.inject_fault(LedgerFault::LockForUpdate);

        let outcome = strategy.purchase(request(1)).await;
        assert_eq!(outcome.status, PurchaseStatus::StoreUnavailable);
        assert!(matches!(
            outcome.error,
            Some(PurchaseError::LockAcquisitionFailed(_))
        ));
        assert_eq!(ledger.read_quantity(product()).await.expect("read"), 3);
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_no_partial_state() {
        let (ledger, stats, strategy) = setup(3);
        ledger.inject_fault(LedgerFault::Commit);

        let outcome = strategy.purchase(request(1)).await;
        assert!(matches!(outcome.error, Some(PurchaseError::CommitFailed(_))));
        assert_eq!(ledger.read_quantity(product()).await.expect("read"), 3);
        assert_eq!(ledger.count_orders(OrderStatus::Success).await.expect("count"), 0);
        assert_eq!(stats.snapshot().failed, 1);

        // The row lock was released with the failed unit
        ledger.clear_faults();
        assert!(strategy.purchase(request(2)).await.is_success());
    }

    #[tokio::test]
    async fn test_order_insert_failure_rolls_back_decrement() {
        let (ledger, _stats, strategy) = setup(3);
        ledger.inject_fault(LedgerFault::InsertOrder);

        let outcome = strategy.purchase(request(1)).await;
        assert!(matches!(outcome.error, Some(PurchaseError::StoreUnavailable(_))));
        assert_eq!(ledger.read_quantity(product()).await.expect("read"), 3);
    }
}
