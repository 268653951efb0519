//! Metrics counters/histograms for pools and enrichment (§4.4 "Metrics",
//! §5 "Counters use atomic integers; min/max write-time updates use
//! compare-and-swap loops").

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PoolMetrics {
    pub connection_attempts: AtomicU64,
    pub connection_failures: AtomicU64,
    pub active_connections: AtomicI64,
    pub idle_connections: AtomicI64,
    pub health_check_count: AtomicU64,
    pub health_check_failures: AtomicU64,
    pub retry_attempts: AtomicU64,
    pub retry_successes: AtomicU64,
    pub batches_successful: AtomicU64,
    pub batches_failed: AtomicU64,
    pub batches_partial: AtomicU64,
    pub requests_total: AtomicU64,
    total_write_time_nanos: AtomicU64,
    write_count: AtomicU64,
    min_write_time_nanos: AtomicI64,
    max_write_time_nanos: AtomicI64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        PoolMetrics {
            min_write_time_nanos: AtomicI64::new(i64::MAX),
            max_write_time_nanos: AtomicI64::new(i64::MIN),
            ..Default::default()
        }
    }

    pub fn record_write(&self, duration: std::time::Duration) {
        let nanos = duration.as_nanos() as i64;
        self.total_write_time_nanos
            .fetch_add(nanos as u64, Ordering::Relaxed);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        cas_min(&self.min_write_time_nanos, nanos);
        cas_max(&self.max_write_time_nanos, nanos);
    }

    pub fn average_write_time_nanos(&self) -> f64 {
        let count = self.write_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_write_time_nanos.load(Ordering::Relaxed) as f64 / count as f64
    }

    pub fn min_write_time_nanos(&self) -> Option<i64> {
        let v = self.min_write_time_nanos.load(Ordering::Relaxed);
        (v != i64::MAX).then_some(v)
    }

    pub fn max_write_time_nanos(&self) -> Option<i64> {
        let v = self.max_write_time_nanos.load(Ordering::Relaxed);
        (v != i64::MIN).then_some(v)
    }
}

/// Compare-and-swap loop keeping the running minimum (§5).
fn cas_min(slot: &AtomicI64, candidate: i64) {
    let mut current = slot.load(Ordering::Relaxed);
    while candidate < current {
        match slot.compare_exchange_weak(current, candidate, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

fn cas_max(slot: &AtomicI64, candidate: i64) {
    let mut current = slot.load(Ordering::Relaxed);
    while candidate > current {
        match slot.compare_exchange_weak(current, candidate, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_and_max_write_time_track_via_cas() {
        let metrics = PoolMetrics::new();
        metrics.record_write(std::time::Duration::from_millis(10));
        metrics.record_write(std::time::Duration::from_millis(2));
        metrics.record_write(std::time::Duration::from_millis(50));
        assert_eq!(metrics.min_write_time_nanos().unwrap(), 2_000_000);
        assert_eq!(metrics.max_write_time_nanos().unwrap(), 50_000_000);
    }
}
