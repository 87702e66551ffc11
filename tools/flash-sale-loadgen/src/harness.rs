//! Batched concurrent load against one [`PurchaseTarget`]
//!
//! Attempts run in sequential batches of `concurrency`. Every attempt in a
//! batch is spawned at once and the whole batch is awaited before the next
//! starts, so at most `concurrency` attempts are ever in flight.

use crate::target::{PurchaseTarget, TargetError};
use flash_sale::domain::{Capacity, ProductId, PurchaseStatus, RawPurchaseRequest, StrategyKind};
use nutype::nutype;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Total purchase attempts in one run
#[nutype(
    validate(greater = 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRef, Serialize, Deserialize)
)]
pub struct RequestCount(usize);

/// Attempts in flight at once
#[nutype(
    validate(greater = 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRef, Serialize, Deserialize)
)]
pub struct ConcurrencyLevel(usize);

#[derive(Debug, Clone, Copy)]
pub struct HarnessConfig {
    pub total_requests: RequestCount,
    pub concurrency: ConcurrencyLevel,
    pub product_id: ProductId,
    pub initial_capacity: Capacity,
}

/// Outcome counts plus the state read back after the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub strategy: StrategyKind,
    pub total: usize,
    pub success: usize,
    pub out_of_stock: usize,
    pub validation_error: usize,
    pub store_unavailable: usize,
    pub elapsed: Duration,
    pub successful_orders: i64,
    pub final_quantity: i64,
    pub initial_capacity: i64,
}

impl LoadReport {
    fn new(strategy: StrategyKind, initial_capacity: i64) -> Self {
        Self {
            strategy,
            total: 0,
            success: 0,
            out_of_stock: 0,
            validation_error: 0,
            store_unavailable: 0,
            elapsed: Duration::ZERO,
            successful_orders: 0,
            final_quantity: 0,
            initial_capacity,
        }
    }

    fn record(&mut self, status: PurchaseStatus) {
        self.total += 1;
        match status {
            PurchaseStatus::Success => self.success += 1,
            PurchaseStatus::OutOfStock => self.out_of_stock += 1,
            PurchaseStatus::ValidationError => self.validation_error += 1,
            PurchaseStatus::StoreUnavailable => self.store_unavailable += 1,
        }
    }

    /// Orders accepted beyond the initial capacity
    pub fn oversold(&self) -> i64 {
        (self.successful_orders - self.initial_capacity).max(0)
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mode: {}", self.strategy.mode_name())?;
        writeln!(f, "Time taken: {:?}", self.elapsed)?;
        writeln!(
            f,
            "Attempts: {} (success {}, out of stock {}, invalid {}, unavailable {})",
            self.total, self.success, self.out_of_stock, self.validation_error, self.store_unavailable
        )?;
        writeln!(f, "Successful orders: {}", self.successful_orders)?;
        writeln!(
            f,
            "Final quantity: {} (capacity {})",
            self.final_quantity, self.initial_capacity
        )?;
        write!(f, "Oversold: {}", self.oversold())
    }
}

/// Each attempt buys as its own user
fn user_id_for(attempt: usize) -> i64 {
    i64::try_from(attempt).unwrap_or(i64::MAX)
}

pub struct LoadHarness<T> {
    target: Arc<T>,
    config: HarnessConfig,
}

impl<T: PurchaseTarget + 'static> LoadHarness<T> {
    pub fn new(target: Arc<T>, config: HarnessConfig) -> Self {
        Self { target, config }
    }

    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    pub async fn run(&self) -> Result<LoadReport, TargetError> {
        let total = self.config.total_requests.into_inner();
        let concurrency = self.config.concurrency.into_inner();
        let product_id = i64::from(self.config.product_id.into_inner());
        let mut report = LoadReport::new(
            self.target.strategy(),
            self.config.initial_capacity.units(),
        );

        info!(
            mode = self.target.strategy().mode_name(),
            total, concurrency, "Starting load run"
        );
        let started = Instant::now();

        for batch_start in (0..total).step_by(concurrency) {
            let batch_end = (batch_start + concurrency).min(total);
            let mut tasks = JoinSet::new();
            for attempt in batch_start..batch_end {
                let target = Arc::clone(&self.target);
                let request = RawPurchaseRequest {
                    user_id: user_id_for(attempt),
                    product_id,
                };
                tasks.spawn(async move { target.purchase(request).await });
            }

            while let Some(joined) = tasks.join_next().await {
                let status = match joined {
                    Ok(Ok(status)) => status,
                    Ok(Err(err)) => {
                        warn!(error = %err, "Purchase attempt failed in transport");
                        PurchaseStatus::StoreUnavailable
                    }
                    Err(err) => {
                        warn!(error = %err, "Purchase task did not complete");
                        PurchaseStatus::StoreUnavailable
                    }
                };
                report.record(status);
            }
        }

        report.elapsed = started.elapsed();
        let observed = self.target.observe().await?;
        report.successful_orders = observed.successful_orders;
        report.final_quantity = observed.final_quantity;

        info!(
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            orders = report.successful_orders,
            oversold = report.oversold(),
            "Load run complete"
        );
        Ok(report)
    }
}
