//! Load generator for the flash sale inventory
//!
//! Fires batches of concurrent purchase attempts at one strategy and reports
//! how many orders were accepted against the initial capacity.

pub mod harness;
pub mod target;

pub use harness::{ConcurrencyLevel, HarnessConfig, LoadHarness, LoadReport, RequestCount};
pub use target::{HttpTarget, InProcessTarget, Observation, PurchaseTarget, TargetError};
