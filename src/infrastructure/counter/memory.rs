//! Process-local fast counter
//!
//! One `AtomicI64` per key. The gate is a single compare-and-swap loop
//! (`fetch_update`), so no two callers can decrement from the same observed
//! value and no caller-side lock is taken. The key map itself sits behind a
//! `parking_lot::RwLock` that is only held for the lookup, never across an
//! await.

use super::{CounterError, FastCounter, GATE_UNAVAILABLE};
use crate::domain::CacheKey;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Counter operation that can be made to fail on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterFault {
    Decrement,
    Increment,
    Set,
    Get,
}

/// Process-local fast counter
#[derive(Clone, Default)]
pub struct InMemoryFastCounter {
    entries: Arc<RwLock<HashMap<CacheKey, Arc<AtomicI64>>>>,
    faults: Arc<Mutex<HashSet<CounterFault>>>,
}

impl InMemoryFastCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_fault(&self, fault: CounterFault) {
        self.faults.lock().insert(fault);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    fn check(&self, fault: CounterFault) -> Result<(), CounterError> {
        if self.faults.lock().contains(&fault) {
            Err(CounterError::Unavailable(format!("injected {fault:?} fault")))
        } else {
            Ok(())
        }
    }

    fn entry(&self, key: &CacheKey) -> Option<Arc<AtomicI64>> {
        self.entries.read().get(key).cloned()
    }

    fn entry_or_insert(&self, key: &CacheKey) -> Arc<AtomicI64> {
        if let Some(entry) = self.entry(key) {
            return entry;
        }
        Arc::clone(
            self.entries
                .write()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AtomicI64::new(0))),
        )
    }
}

#[async_trait]
impl FastCounter for InMemoryFastCounter {
    async fn atomic_test_and_decrement(&self, key: &CacheKey) -> Result<i64, CounterError> {
        self.check(CounterFault::Decrement)?;
        let Some(entry) = self.entry(key) else {
            return Ok(GATE_UNAVAILABLE);
        };

        let outcome = entry.fetch_update(Ordering::AcqRel, Ordering::Acquire, |stock| {
            if stock > 0 {
                Some(stock - 1)
            } else {
                None
            }
        });
        Ok(match outcome {
            Ok(previous) => previous - 1,
            Err(_) => GATE_UNAVAILABLE,
        })
    }

    async fn increment(&self, key: &CacheKey) -> Result<i64, CounterError> {
        self.check(CounterFault::Increment)?;
        let entry = self.entry_or_insert(key);
        Ok(entry.fetch_add(1, Ordering::AcqRel) + 1)
    }

    async fn set(&self, key: &CacheKey, value: i64) -> Result<(), CounterError> {
        self.check(CounterFault::Set)?;
        self.entry_or_insert(key).store(value, Ordering::Release);
        Ok(())
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<i64>, CounterError> {
        self.check(CounterFault::Get)?;
        Ok(self.entry(key).map(|entry| entry.load(Ordering::Acquire)))
    }
}
