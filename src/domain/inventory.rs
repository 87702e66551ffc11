//! Ledger records and the cache key that mirrors them

use super::types::{ProductId, UserId};
use chrono::{DateTime, Utc};
use nutype::nutype;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A product row as held by the stock ledger
///
/// `quantity` is signed on purpose: the unprotected strategy is allowed to
/// drive it below zero, and that negative value is how oversell shows up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: i64,
}

/// Product data used to seed an empty ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub price: Decimal,
    pub quantity: i64,
}

impl NewProduct {
    /// The flash sale item the demo ships with
    pub fn flash_sale_item(quantity: i64) -> Self {
        Self {
            name: "iPhone 15 Pro".to_string(),
            price: Decimal::new(99900, 2),
            quantity,
        }
    }
}

/// Order status as stored in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Column default; never written by a strategy
    Pending,
    Success,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }
}

/// An order row; one exists per successful decrement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Key of the fast counter entry that caches a product's stock
#[nutype(derive(Debug, Clone, PartialEq, Eq, Hash, Display, AsRef))]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_product(product_id: ProductId) -> Self {
        Self::new(format!("product:{product_id}:stock"))
    }
}
