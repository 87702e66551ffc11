//! Infrastructure layer for the flash sale inventory
//!
//! This module contains the stock ledger (durable, transactional) and the
//! fast counter (Redis or in-process, atomic) that the decrement strategies run against.

pub mod counter;
pub mod ledger;

pub use counter::{
    CounterError, CounterFault, FastCounter, InMemoryFastCounter, RedisFastCounter,
    GATE_UNAVAILABLE,
};
pub use ledger::{
    InMemoryLedger, LedgerError, LedgerFault, LedgerUnit, PostgresLedger, StockLedger,
};
