//! PostgreSQL-backed stock ledger
//!
//! Units of work are `sqlx` transactions. `read_quantity_for_update` issues
//! `SELECT ... FOR UPDATE`, so concurrent lockers of the same product row queue
//! inside PostgreSQL until the holder commits or rolls back.
//!
//! The `products.quantity` column deliberately has no CHECK constraint: the
//! unprotected strategy must be able to drive it negative.

use super::{LedgerError, LedgerUnit, StockLedger};
use crate::domain::{NewProduct, Order, OrderStatus, Product, ProductId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

/// Row shape of the `products` table
#[derive(Debug, Clone, FromRow)]
struct DbProduct {
    id: i32,
    name: String,
    price: Decimal,
    quantity: i64,
}

impl TryFrom<DbProduct> for Product {
    type Error = LedgerError;

    fn try_from(row: DbProduct) -> Result<Self, Self::Error> {
        let id = ProductId::try_new(row.id)
            .map_err(|e| LedgerError::CorruptRow(format!("products.id {}: {e}", row.id)))?;
        Ok(Product {
            id,
            name: row.name,
            price: row.price,
            quantity: row.quantity,
        })
    }
}

/// Row shape of the `orders` table
#[derive(Debug, Clone, FromRow)]
struct DbOrder {
    id: i64,
    user_id: i32,
    product_id: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbOrder> for Order {
    type Error = LedgerError;

    fn try_from(row: DbOrder) -> Result<Self, Self::Error> {
        let user_id = UserId::try_new(row.user_id)
            .map_err(|e| LedgerError::CorruptRow(format!("orders.user_id {}: {e}", row.user_id)))?;
        let product_id = ProductId::try_new(row.product_id).map_err(|e| {
            LedgerError::CorruptRow(format!("orders.product_id {}: {e}", row.product_id))
        })?;
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|e| LedgerError::CorruptRow(e.to_string()))?;

        Ok(Order {
            id: row.id,
            user_id,
            product_id,
            status,
            created_at: row.created_at,
        })
    }
}

/// Stock ledger stored in PostgreSQL
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema migrations bundled with the crate
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerUnit for PostgresUnit {
    async fn read_quantity_for_update(&mut self, product_id: ProductId) -> Result<i64, LedgerError> {
        let quantity: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id.into_inner())
                .fetch_optional(&mut *self.tx)
                .await?;
        quantity.ok_or(LedgerError::ProductNotFound(product_id))
    }

    async fn decrement_quantity(&mut self, product_id: ProductId) -> Result<i64, LedgerError> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET quantity = quantity - 1 WHERE id = $1 RETURNING quantity",
        )
        .bind(product_id.into_inner())
        .fetch_optional(&mut *self.tx)
        .await?;
        quantity.ok_or(LedgerError::ProductNotFound(product_id))
    }

    async fn insert_order(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        status: OrderStatus,
    ) -> Result<(), LedgerError> {
        sqlx::query("INSERT INTO orders (user_id, product_id, status) VALUES ($1, $2, $3)")
            .bind(user_id.into_inner())
            .bind(product_id.into_inner())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl StockLedger for PostgresLedger {
    async fn begin_unit(&self) -> Result<Box<dyn LedgerUnit>, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresUnit { tx }))
    }

    async fn read_quantity(&self, product_id: ProductId) -> Result<i64, LedgerError> {
        let quantity: Option<i64> = sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1")
            .bind(product_id.into_inner())
            .fetch_optional(&self.pool)
            .await?;
        quantity.ok_or(LedgerError::ProductNotFound(product_id))
    }

    async fn decrement_quantity(&self, product_id: ProductId) -> Result<i64, LedgerError> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET quantity = quantity - 1 WHERE id = $1 RETURNING quantity",
        )
        .bind(product_id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        quantity.ok_or(LedgerError::ProductNotFound(product_id))
    }

    async fn insert_order(
        &self,
        user_id: UserId,
        product_id: ProductId,
        status: OrderStatus,
    ) -> Result<(), LedgerError> {
        sqlx::query("INSERT INTO orders (user_id, product_id, status) VALUES ($1, $2, $3)")
            .bind(user_id.into_inner())
            .bind(product_id.into_inner())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_inventory(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE products SET quantity = $2 WHERE id = $1")
            .bind(product_id.into_inner())
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(LedgerError::ProductNotFound(product_id));
        }

        sqlx::query("DELETE FROM orders").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn count_orders(&self, status: OrderStatus) -> Result<i64, LedgerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_products(&self) -> Result<Vec<Product>, LedgerError> {
        let rows: Vec<DbProduct> =
            sqlx::query_as("SELECT id, name, price, quantity FROM products ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, LedgerError> {
        let rows: Vec<DbOrder> = sqlx::query_as(
            r#"
            SELECT id, user_id, product_id, status, created_at
            FROM orders
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn seed_if_empty(&self, product: &NewProduct) -> Result<Option<ProductId>, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // Serialise concurrent seeders so only one of them inserts
        sqlx::query("LOCK TABLE products IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Ok(None);
        }

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO products (name, price, quantity) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(product.quantity)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        ProductId::try_new(id)
            .map(Some)
            .map_err(|e| LedgerError::CorruptRow(format!("products.id {id}: {e}")))
    }
}
