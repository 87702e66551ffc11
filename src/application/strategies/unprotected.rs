//! Unprotected decrement: the deliberate race condition
//!
//! Every step is its own autocommit ledger call. Nothing isolates the read
//! from the write, and the artificial delay between them widens the window
//! in which concurrent attempts all see the same positive quantity. Quantity
//! going negative and orders exceeding capacity are the expected result here.

use super::{store_unavailable, PurchaseStrategy};
use crate::application::stats::StatsAggregator;
use crate::domain::{OrderStatus, PurchaseError, PurchaseRequest, StrategyKind};
use crate::infrastructure::StockLedger;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub struct UnprotectedStrategy {
    ledger: Arc<dyn StockLedger>,
    stats: Arc<StatsAggregator>,
    delay: Duration,
}

impl UnprotectedStrategy {
    pub fn new(ledger: Arc<dyn StockLedger>, stats: Arc<StatsAggregator>, delay: Duration) -> Self {
        Self {
            ledger,
            stats,
            delay,
        }
    }
}

#[async_trait]
impl PurchaseStrategy for UnprotectedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Unprotected
    }

    fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    async fn attempt(&self, request: PurchaseRequest) -> Result<(), PurchaseError> {
        let quantity = self
            .ledger
            .read_quantity(request.product_id)
            .await
            .map_err(store_unavailable)?;
        if quantity <= 0 {
            return Err(PurchaseError::OutOfStock);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let remaining = self
            .ledger
            .decrement_quantity(request.product_id)
            .await
            .map_err(store_unavailable)?;
        self.ledger
            .insert_order(request.user_id, request.product_id, OrderStatus::Success)
            .await
            .map_err(store_unavailable)?;

        if remaining < 0 {
            self.stats.record_oversell();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewProduct, PurchaseStatus, RawPurchaseRequest};
    use crate::infrastructure::{InMemoryLedger, LedgerFault};

    fn setup(quantity: i64, delay: Duration) -> (InMemoryLedger, Arc<StatsAggregator>, UnprotectedStrategy) {
        let ledger = InMemoryLedger::new();
        ledger
            .insert_product(&NewProduct::flash_sale_item(quantity))
            .expect("seed");
        let stats = Arc::new(StatsAggregator::new());
        let strategy = UnprotectedStrategy::new(Arc::new(ledger.clone()), Arc::clone(&stats), delay);
        (ledger, stats, strategy)
    }

    fn request(user_id: i64) -> RawPurchaseRequest {
        RawPurchaseRequest {
            user_id,
            product_id: 1,
        }
    }

    #[tokio::test]
    async fn test_sequential_purchases_stop_at_zero() {
        let (ledger, stats, strategy) = setup(2, Duration::ZERO);

        assert!(strategy.purchase(request(1)).await.is_success());
        assert!(strategy.purchase(request(2)).await.is_success());
        let third = strategy.purchase(request(3)).await;
        assert_eq!(third.status, PurchaseStatus::OutOfStock);

        assert_eq!(ledger.count_orders(OrderStatus::Success).await.expect("count"), 2);
        let snapshot = stats.snapshot();
        assert_eq!((snapshot.total, snapshot.success, snapshot.failed), (3, 2, 1));
        assert_eq!(snapshot.oversells, 0);
    }

    #[tokio::test]
    async fn test_concurrent_purchases_oversell_and_are_counted() {
        let (ledger, stats, strategy) = setup(1, Duration::from_millis(20));
        let strategy = Arc::new(strategy);

        let mut tasks = tokio::task::JoinSet::new();
        for user in 0..5 {
            let strategy = Arc::clone(&strategy);
            tasks.spawn(async move { strategy.purchase(request(user)).await });
        }
        while let Some(joined) = tasks.join_next().await {
            assert!(joined.expect("join").is_success());
        }

        let product = crate::domain::ProductId::try_new(1).expect("valid id");
        assert_eq!(ledger.read_quantity(product).await.expect("read"), -4);
        assert_eq!(ledger.count_orders(OrderStatus::Success).await.expect("count"), 5);
        assert_eq!(stats.snapshot().oversells, 4);
    }

    #[tokio::test]
    async fn test_ledger_failure_writes_no_order() {
        let (ledger, stats, strategy) = setup(5, Duration::ZERO);
        ledger.inject_fault(LedgerFault::Decrement);

        let outcome = strategy.purchase(request(1)).await;
        assert_eq!(outcome.status, PurchaseStatus::StoreUnavailable);
        assert!(matches!(outcome.error, Some(PurchaseError::StoreUnavailable(_))));
        assert_eq!(ledger.count_orders(OrderStatus::Success).await.expect("count"), 0);
        assert_eq!(stats.snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_ledger() {
        let (ledger, stats, strategy) = setup(5, Duration::ZERO);
        ledger.inject_fault(LedgerFault::Read);

        let outcome = strategy
            .purchase(RawPurchaseRequest {
                user_id: 1,
                product_id: -1,
            })
            .await;
        assert_eq!(outcome.status, PurchaseStatus::ValidationError);
        let snapshot = stats.snapshot();
        assert_eq!((snapshot.total, snapshot.failed), (1, 1));
    }
}
