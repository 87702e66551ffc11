//! Stock ledger abstraction
//!
//! The ledger is the authoritative owner of product quantities and order rows.
//! It offers two kinds of access:
//!
//! - plain autocommit operations on [`StockLedger`], used by the unprotected
//!   strategy and by the service's maintenance operations, and
//! - a [`LedgerUnit`] (unit of work) that either fully commits or fully rolls
//!   back. `read_quantity_for_update` inside a unit takes an exclusive row lock
//!   that is held until the unit ends.
//!
//! Dropping a unit without committing must behave like a rollback.

mod memory;
mod postgres;

pub use memory::{InMemoryLedger, LedgerFault};
pub use postgres::PostgresLedger;

use crate::domain::{NewProduct, Order, OrderStatus, Product, ProductId, UserId};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a stock ledger backend
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt ledger row: {0}")]
    CorruptRow(String),
}

/// A bounded sequence of ledger reads and writes
#[async_trait]
pub trait LedgerUnit: Send {
    /// Read the quantity while holding the row's exclusive lock until the unit ends
    async fn read_quantity_for_update(&mut self, product_id: ProductId) -> Result<i64, LedgerError>;

    /// Decrement by one and return the quantity as seen inside this unit
    async fn decrement_quantity(&mut self, product_id: ProductId) -> Result<i64, LedgerError>;

    async fn insert_order(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        status: OrderStatus,
    ) -> Result<(), LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Authoritative store of products and orders
#[async_trait]
pub trait StockLedger: Send + Sync {
    async fn begin_unit(&self) -> Result<Box<dyn LedgerUnit>, LedgerError>;

    /// Non-locking read of the committed quantity
    async fn read_quantity(&self, product_id: ProductId) -> Result<i64, LedgerError>;

    /// Autocommit decrement by one; returns the new quantity
    async fn decrement_quantity(&self, product_id: ProductId) -> Result<i64, LedgerError>;

    /// Autocommit order insert
    async fn insert_order(
        &self,
        user_id: UserId,
        product_id: ProductId,
        status: OrderStatus,
    ) -> Result<(), LedgerError>;

    /// Restore a product's quantity and delete every order row
    async fn reset_inventory(&self, product_id: ProductId, quantity: i64)
        -> Result<(), LedgerError>;

    async fn count_orders(&self, status: OrderStatus) -> Result<i64, LedgerError>;

    async fn list_products(&self) -> Result<Vec<Product>, LedgerError>;

    /// Newest orders first
    async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, LedgerError>;

    /// Insert `product` only if the ledger holds no products yet.
    ///
    /// Returns the new product's id, or `None` when seeding was skipped.
    async fn seed_if_empty(&self, product: &NewProduct) -> Result<Option<ProductId>, LedgerError>;
}
