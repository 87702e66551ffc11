//! Purchase statistics for the dashboard
//!
//! Five independent atomic counters. Each mutation touches exactly one of them,
//! so a snapshot is a best-effort point-in-time read and may be mid-update
//! across counters. These numbers are observational only: no strategy ever
//! reads them to decide whether to admit a purchase.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Owned, injectable purchase counters
#[derive(Debug, Default)]
pub struct StatsAggregator {
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    oversells: AtomicU64,
    latency_ms: AtomicU64,
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(rename = "total_requests")]
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub oversells: u64,
    pub avg_latency_ms: f64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, latency: Duration) {
        self.success.fetch_add(1, Ordering::Relaxed);
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.fetch_add(millis, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oversell(&self) {
        self.oversells.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let latency_ms = self.latency_ms.load(Ordering::Relaxed);

        // Average is over all attempts, while only successes contribute latency
        let avg_latency_ms = if total > 0 {
            latency_ms as f64 / total as f64
        } else {
            0.0
        };

        StatsSnapshot {
            total,
            success: self.success.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            oversells: self.oversells.load(Ordering::Relaxed),
            avg_latency_ms,
        }
    }

    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.success.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.oversells.store(0, Ordering::Relaxed);
        self.latency_ms.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_snapshot_has_zero_average() {
        let stats = StatsAggregator::new();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.avg_latency_ms, 0.0);
    }

    #[test]
    fn test_average_latency_divides_by_total_attempts() {
        let stats = StatsAggregator::new();
        for _ in 0..4 {
            stats.record_attempt();
        }
        stats.record_success(Duration::from_millis(10));
        stats.record_success(Duration::from_millis(30));
        stats.record_failure();
        stats.record_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.success, 2);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.avg_latency_ms, 10.0);
    }

    #[test]
    fn test_reset_clears_every_counter() {
        let stats = StatsAggregator::new();
        stats.record_attempt();
        stats.record_success(Duration::from_millis(3));
        stats.record_failure();
        stats.record_oversell();

        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot,
            StatsSnapshot {
                total: 0,
                success: 0,
                failed: 0,
                oversells: 0,
                avg_latency_ms: 0.0,
            }
        );
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let stats = Arc::new(StatsAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_attempt();
                        stats.record_oversell();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked");
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 8000);
        assert_eq!(snapshot.oversells, 8000);
    }

    #[test]
    fn test_snapshot_serializes_with_dashboard_field_names() {
        let stats = StatsAggregator::new();
        stats.record_attempt();
        let json = serde_json::to_value(stats.snapshot()).expect("serialize");
        assert_eq!(json["total_requests"], 1);
        assert!(json.get("avg_latency_ms").is_some());
    }
}
