//! Worker pool configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::IngestionSettings;

/// Worker pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionConfig {
    /// Concurrent `on_message` workers
    pub workers: usize,

    /// Payloads buffered between the source and the workers
    pub queue_capacity: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 100,
        }
    }
}

impl IngestionConfig {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
        }
    }
}

impl From<&IngestionSettings> for IngestionConfig {
    fn from(settings: &IngestionSettings) -> Self {
        Self::new(settings.workers, settings.queue_capacity)
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total payloads received
    pub received: AtomicU64,

    /// Payloads that reached the dispatcher
    pub dispatched: AtomicU64,

    /// Payloads that could not be parsed
    pub malformed: AtomicU64,

    /// Payloads that failed validation
    pub invalid: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub dispatched: u64,
    pub malformed: u64,
    pub invalid: u64,
}

impl MetricsSnapshot {
    /// Payloads discarded before dispatch
    pub fn rejected(&self) -> u64 {
        self.malformed + self.invalid
    }
}
