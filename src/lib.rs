//! Flash Sale - oversell-safe inventory decrement under concurrent load
//!
//! Three interchangeable purchase strategies run over a transactional stock
//! ledger and an atomic fast counter: an unprotected control case, a
//! pessimistic row lock, and a cache-gated path with compensation. A shared
//! stats aggregator records every attempt.

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::{Application, InventoryService};
pub use error::{Error, Result};
