//! Application services and business logic orchestration
//!
//! This module wires the decrement strategies, the stats aggregator and the
//! inventory service over the infrastructure backends.

pub mod app;
pub mod inventory_service;
pub mod stats;
pub mod strategies;

pub use app::Application;
pub use inventory_service::{
    Dashboard, InventoryConfig, InventoryService, ServiceError, RECENT_ORDERS_LIMIT,
};
pub use stats::{StatsAggregator, StatsSnapshot};
pub use strategies::{GatedStrategy, PessimisticStrategy, PurchaseStrategy, UnprotectedStrategy};
