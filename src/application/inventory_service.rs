//! Inventory service: the boundary the HTTP layer and the load harness talk to
//!
//! Owns one ledger, one fast counter, one stats aggregator and the three
//! strategies built over them. Besides `purchase`, it provides the maintenance
//! operations (`reset`, `sync_cache`, seeding) and the read models behind the
//! dashboard.

use crate::application::stats::{StatsAggregator, StatsSnapshot};
use crate::application::strategies::{
    GatedStrategy, PessimisticStrategy, PurchaseStrategy, UnprotectedStrategy,
};
use crate::domain::{
    CacheKey, Capacity, DelayMillis, NewProduct, Order, OrderStatus, Product, ProductId,
    PurchaseError, PurchaseOutcome, RawPurchaseRequest, StrategyKind,
};
use crate::infrastructure::{
    CounterError, FastCounter, InMemoryFastCounter, InMemoryLedger, LedgerError, StockLedger,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Default number of orders returned by [`InventoryService::recent_orders`]
pub const RECENT_ORDERS_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Fast counter error: {0}")]
    Counter(#[from] CounterError),
}

/// Which product the sale runs on and how it is stocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryConfig {
    pub product_id: ProductId,
    pub initial_capacity: Capacity,
    pub naive_delay: DelayMillis,
}

/// Stats snapshot joined with live stock levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub db_stock: i64,
    #[serde(rename = "redis_stock")]
    pub cache_stock: Option<i64>,
    pub order_count: i64,
}

pub struct InventoryService {
    ledger: Arc<dyn StockLedger>,
    counter: Arc<dyn FastCounter>,
    stats: Arc<StatsAggregator>,
    config: InventoryConfig,
    unprotected: UnprotectedStrategy,
    pessimistic: PessimisticStrategy,
    gated: GatedStrategy,
}

impl InventoryService {
    pub fn new(
        ledger: Arc<dyn StockLedger>,
        counter: Arc<dyn FastCounter>,
        stats: Arc<StatsAggregator>,
        config: InventoryConfig,
    ) -> Self {
        let unprotected = UnprotectedStrategy::new(
            Arc::clone(&ledger),
            Arc::clone(&stats),
            config.naive_delay.as_duration(),
        );
        let pessimistic = PessimisticStrategy::new(Arc::clone(&ledger), Arc::clone(&stats));
        let gated = GatedStrategy::new(Arc::clone(&ledger), Arc::clone(&counter), Arc::clone(&stats));

        Self {
            ledger,
            counter,
            stats,
            config,
            unprotected,
            pessimistic,
            gated,
        }
    }

    /// A seeded service over fresh in-memory backends
    pub async fn in_memory(config: InventoryConfig) -> Result<Self, ServiceError> {
        let service = Self::new(
            Arc::new(InMemoryLedger::new()),
            Arc::new(InMemoryFastCounter::new()),
            Arc::new(StatsAggregator::new()),
            config,
        );
        service.seed().await?;
        Ok(service)
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    pub fn strategy(&self, kind: StrategyKind) -> &dyn PurchaseStrategy {
        match kind {
            StrategyKind::Unprotected => &self.unprotected,
            StrategyKind::PessimisticLocked => &self.pessimistic,
            StrategyKind::CacheGated => &self.gated,
        }
    }

    pub async fn purchase(&self, kind: StrategyKind, request: RawPurchaseRequest) -> PurchaseOutcome {
        self.strategy(kind).purchase(request).await
    }

    /// Account for a request whose body could not even be parsed
    pub fn reject_malformed(&self, kind: StrategyKind, reason: impl Into<String>) -> PurchaseOutcome {
        self.stats.record_attempt();
        self.stats.record_failure();
        PurchaseOutcome::failed(kind, PurchaseError::Validation(reason.into()), Duration::ZERO)
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::for_product(self.config.product_id)
    }

    /// Insert the sale product and prime the cache, unless the ledger already has products
    #[instrument(skip(self))]
    pub async fn seed(&self) -> Result<bool, ServiceError> {
        let capacity = self.config.initial_capacity.units();
        let seeded = self
            .ledger
            .seed_if_empty(&NewProduct::flash_sale_item(capacity))
            .await?;

        match seeded {
            Some(product_id) => {
                if product_id != self.config.product_id {
                    warn!(
                        %product_id,
                        configured = %self.config.product_id,
                        "Seeded product id differs from the configured sale product"
                    );
                }
                self.counter.set(&self.cache_key(), capacity).await?;
                info!(capacity, "Seeded ledger and cache");
                Ok(true)
            }
            None => {
                info!("Ledger already seeded, skipping");
                Ok(false)
            }
        }
    }

    /// Restore stock to capacity, delete all orders, prime the cache and zero the stats
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<(), ServiceError> {
        let capacity = self.config.initial_capacity.units();
        self.ledger
            .reset_inventory(self.config.product_id, capacity)
            .await?;
        self.counter.set(&self.cache_key(), capacity).await?;
        self.stats.reset();
        info!(capacity, "Inventory reset");
        Ok(())
    }

    /// Copy ledger stock into the cache, clamped at zero. Returns the value written.
    #[instrument(skip(self))]
    pub async fn sync_cache(&self) -> Result<i64, ServiceError> {
        let quantity = self.ledger.read_quantity(self.config.product_id).await?;
        let stock = quantity.max(0);
        self.counter.set(&self.cache_key(), stock).await?;
        info!(ledger_quantity = quantity, stock, "Cache synced with ledger");
        Ok(stock)
    }

    pub async fn stock_level(&self) -> Result<i64, ServiceError> {
        Ok(self.ledger.read_quantity(self.config.product_id).await?)
    }

    pub async fn cached_stock(&self) -> Result<Option<i64>, ServiceError> {
        Ok(self.counter.get(&self.cache_key()).await?)
    }

    pub async fn successful_orders(&self) -> Result<i64, ServiceError> {
        Ok(self.ledger.count_orders(OrderStatus::Success).await?)
    }

    pub async fn dashboard(&self) -> Result<Dashboard, ServiceError> {
        Ok(Dashboard {
            stats: self.stats.snapshot(),
            db_stock: self.stock_level().await?,
            cache_stock: self.cached_stock().await?,
            order_count: self.successful_orders().await?,
        })
    }

    pub async fn products(&self) -> Result<Vec<Product>, ServiceError> {
        Ok(self.ledger.list_products().await?)
    }

    pub async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, ServiceError> {
        Ok(self.ledger.recent_orders(limit).await?)
    }
}
