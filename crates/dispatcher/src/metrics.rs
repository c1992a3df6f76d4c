//! Sender metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single sender
#[derive(Debug, Default)]
pub struct SenderMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Deliveries currently running
    in_flight: AtomicUsize,
    /// Total successful deliveries
    delivered_count: AtomicU64,
    /// Total failed deliveries (including timeouts)
    failure_count: AtomicU64,
    /// Deliveries that hit the timeout
    timeout_count: AtomicU64,
    /// Messages refused because the queue was full
    dropped_count: AtomicU64,
}

impl SenderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn set_in_flight(&self, count: usize) {
        self.in_flight.store(count, Ordering::Relaxed);
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    pub fn inc_delivered_count(&self) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timeout_count(&self) -> u64 {
        self.timeout_count.load(Ordering::Relaxed)
    }

    pub fn inc_timeout_count(&self) {
        self.timeout_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            in_flight: self.in_flight(),
            delivered_count: self.delivered_count(),
            failure_count: self.failure_count(),
            timeout_count: self.timeout_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of sender metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub in_flight: usize,
    pub delivered_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
    pub dropped_count: u64,
}

impl MetricsSnapshot {
    /// Attempts that reached the sender worker or were refused by it
    pub fn attempts(&self) -> u64 {
        self.delivered_count + self.failure_count + self.dropped_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = SenderMetrics::new();
        metrics.inc_delivered_count();
        metrics.inc_delivered_count();
        metrics.inc_failure_count();
        metrics.inc_timeout_count();
        metrics.inc_dropped_count();
        metrics.set_queue_len(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.delivered_count, 2);
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.timeout_count, 1);
        assert_eq!(snapshot.queue_len, 3);
        assert_eq!(snapshot.attempts(), 4);
    }
}
