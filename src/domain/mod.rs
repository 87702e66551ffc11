//! Domain types for the flash sale inventory
//!
//! This module contains the validated identifiers, the ledger records and the
//! purchase request/outcome vocabulary shared by every decrement strategy.

pub mod inventory;
pub mod purchase;
pub mod types;

pub use inventory::*;
pub use purchase::*;
pub use types::*;
