//! Stock invariants of the three decrement strategies under concurrent load
//!
//! Everything here runs against the in-memory ledger and fast counter, so no
//! external services are needed.

use flash_sale::application::{InventoryConfig, InventoryService, StatsAggregator};
use flash_sale::domain::{
    CacheKey, Capacity, DelayMillis, OrderStatus, ProductId, PurchaseStatus, RawPurchaseRequest,
    StrategyKind,
};
use flash_sale::infrastructure::{
    FastCounter, InMemoryFastCounter, InMemoryLedger, LedgerFault, StockLedger,
};
use rstest::rstest;
use std::sync::Arc;
use tokio::task::JoinSet;

struct Harness {
    ledger: InMemoryLedger,
    counter: InMemoryFastCounter,
    service: Arc<InventoryService>,
}

async fn harness(capacity: i64, delay_ms: u64) -> Harness {
    let ledger = InMemoryLedger::new();
    let counter = InMemoryFastCounter::new();
    let config = InventoryConfig {
        product_id: ProductId::try_new(1).expect("valid id"),
        initial_capacity: Capacity::try_new(capacity).expect("valid capacity"),
        naive_delay: DelayMillis::new(delay_ms),
    };
    let service = InventoryService::new(
        Arc::new(ledger.clone()),
        Arc::new(counter.clone()),
        Arc::new(StatsAggregator::new()),
        config,
    );
    service.seed().await.expect("seed");
    Harness {
        ledger,
        counter,
        service: Arc::new(service),
    }
}

fn stock_key() -> CacheKey {
    CacheKey::for_product(ProductId::try_new(1).expect("valid id"))
}

/// Fire `attempts` purchases at once and count outcomes by status
async fn burst(service: &Arc<InventoryService>, kind: StrategyKind, attempts: i64) -> (u64, u64) {
    let mut tasks = JoinSet::new();
    for user_id in 0..attempts {
        let service = Arc::clone(service);
        tasks.spawn(async move {
            service
                .purchase(
                    kind,
                    RawPurchaseRequest {
                        user_id,
                        product_id: 1,
                    },
                )
                .await
        });
    }

    let (mut success, mut out_of_stock) = (0, 0);
    while let Some(joined) = tasks.join_next().await {
        match joined.expect("purchase task").status {
            PurchaseStatus::Success => success += 1,
            PurchaseStatus::OutOfStock => out_of_stock += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    (success, out_of_stock)
}

#[rstest]
#[case(StrategyKind::PessimisticLocked, 10, 60)]
#[case(StrategyKind::PessimisticLocked, 50, 50)]
#[case(StrategyKind::PessimisticLocked, 0, 20)]
#[case(StrategyKind::CacheGated, 10, 60)]
#[case(StrategyKind::CacheGated, 50, 50)]
#[case(StrategyKind::CacheGated, 0, 20)]
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_safe_strategies_never_oversell(
    #[case] kind: StrategyKind,
    #[case] capacity: i64,
    #[case] attempts: i64,
) {
    let h = harness(capacity, 0).await;

    let (success, out_of_stock) = burst(&h.service, kind, attempts).await;

    let orders = h.service.successful_orders().await.expect("orders");
    let quantity = h.service.stock_level().await.expect("stock");
    assert_eq!(orders, capacity.min(attempts));
    assert_eq!(quantity, capacity - orders);
    assert!(quantity >= 0);
    assert_eq!(success as i64, orders);
    assert_eq!(out_of_stock as i64, attempts - orders);
    assert_eq!(h.service.stats().snapshot().oversells, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_unprotected_oversells_on_every_run() {
    for run in 0..5 {
        let h = harness(10, 10).await;

        burst(&h.service, StrategyKind::Unprotected, 50).await;

        let orders = h.service.successful_orders().await.expect("orders");
        let quantity = h.service.stock_level().await.expect("stock");
        let oversold = orders - 10;
        assert!(oversold > 0, "run {run} did not oversell");
        assert_eq!(quantity, 10 - orders, "run {run} lost a decrement");
        assert_eq!(h.service.stats().snapshot().oversells as i64, oversold);
    }
}

#[tokio::test]
async fn test_reset_is_idempotent() {
    let h = harness(10, 0).await;
    burst(&h.service, StrategyKind::CacheGated, 4).await;

    h.service.reset().await.expect("first reset");
    let first = h.service.dashboard().await.expect("dashboard");
    h.service.reset().await.expect("second reset");
    let second = h.service.dashboard().await.expect("dashboard");

    assert_eq!(first, second);
    assert_eq!(second.db_stock, 10);
    assert_eq!(second.cache_stock, Some(10));
    assert_eq!(second.order_count, 0);
    assert_eq!(
        h.ledger.count_orders(OrderStatus::Success).await.expect("count"),
        0
    );
}

#[rstest]
#[case(-7, 0)]
#[case(3, 3)]
#[tokio::test]
async fn test_cache_resync_from_drifted_value(#[case] drifted: i64, #[case] ledger_stock: i64) {
    let h = harness(3, 0).await;
    if ledger_stock == 0 {
        for _ in 0..3 {
            h.service
                .purchase(
                    StrategyKind::PessimisticLocked,
                    RawPurchaseRequest {
                        user_id: 1,
                        product_id: 1,
                    },
                )
                .await;
        }
    }
    h.counter.set(&stock_key(), drifted).await.expect("drift");

    let synced = h.service.sync_cache().await.expect("sync");

    assert_eq!(synced, ledger_stock);
    assert_eq!(
        h.counter.get(&stock_key()).await.expect("get"),
        Some(ledger_stock)
    );
}

#[tokio::test]
async fn test_sync_clamps_negative_ledger_stock() {
    let h = harness(2, 20).await;
    burst(&h.service, StrategyKind::Unprotected, 6).await;
    assert!(h.service.stock_level().await.expect("stock") < 0);

    assert_eq!(h.service.sync_cache().await.expect("sync"), 0);
    assert_eq!(h.counter.get(&stock_key()).await.expect("get"), Some(0));
}

#[tokio::test]
async fn test_failed_ledger_write_returns_gated_reservation() {
    let h = harness(5, 0).await;
    h.ledger.inject_fault(LedgerFault::InsertOrder);

    let outcome = h
        .service
        .purchase(
            StrategyKind::CacheGated,
            RawPurchaseRequest {
                user_id: 9,
                product_id: 1,
            },
        )
        .await;

    assert_eq!(outcome.status, PurchaseStatus::StoreUnavailable);
    assert_eq!(h.counter.get(&stock_key()).await.expect("get"), Some(5));
    assert_eq!(h.service.stock_level().await.expect("stock"), 5);

    h.ledger.clear_faults();
    let (success, _) = burst(&h.service, StrategyKind::CacheGated, 8).await;
    assert_eq!(success, 5);
    assert_eq!(h.counter.get(&stock_key()).await.expect("get"), Some(0));
}
