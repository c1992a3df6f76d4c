//! AuditSink implementations
//!
//! - `TracingAuditSink`: structured events under the `audit` target
//! - `ChannelAuditSink`: forwards records to a tokio channel
//! - `MemoryAuditSink`: keeps records in memory (tests, summaries)
//! - `AggregatingAuditSink`: folds records into an `AuditSummary` and forwards them
//! - `NullAuditSink`: discards everything

use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{AuditRecord, AuditSink, Outcome, Rejection};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::metrics::{AuditAggregator, AuditSummary};

/// Tracing target used for audit events
pub const AUDIT_TARGET: &str = "audit";

/// Audit sink that emits one tracing event per record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        match record.outcome {
            Outcome::Delivered => info!(
                target: AUDIT_TARGET,
                channel = %record.channel,
                recipient = %record.recipient,
                sender = record.sender.as_deref().unwrap_or("-"),
                outcome = %record.outcome,
                elapsed_ms = record.elapsed_ms,
                "Notification delivered"
            ),
            Outcome::Failed => error!(
                target: AUDIT_TARGET,
                channel = %record.channel,
                recipient = %record.recipient,
                sender = record.sender.as_deref().unwrap_or("-"),
                outcome = %record.outcome,
                reason = record.reason.as_deref().unwrap_or_default(),
                elapsed_ms = record.elapsed_ms,
                "Notification delivery failed"
            ),
            Outcome::Unroutable => warn!(
                target: AUDIT_TARGET,
                channel = %record.channel,
                recipient = %record.recipient,
                outcome = %record.outcome,
                reason = record.reason.as_deref().unwrap_or_default(),
                "Notification unroutable"
            ),
        }
    }

    fn reject(&self, rejection: &Rejection) {
        error!(
            target: AUDIT_TARGET,
            kind = %rejection.kind,
            channel = rejection.channel.as_deref().unwrap_or("-"),
            reason = %rejection.reason,
            "Payload rejected"
        );
    }
}

/// Audit sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &AuditRecord) {}

    fn reject(&self, _rejection: &Rejection) {}
}

/// Audit event forwarded by `ChannelAuditSink`
#[derive(Debug, Clone)]
pub enum AuditEvent {
    Dispatch(AuditRecord),
    Rejected(Rejection),
}

/// Audit sink that forwards events to an unbounded channel
///
/// Unbounded so `record` never blocks the dispatch path; events are dropped
/// once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuditEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, record: &AuditRecord) {
        let _ = self.tx.send(AuditEvent::Dispatch(record.clone()));
    }

    fn reject(&self, rejection: &Rejection) {
        let _ = self.tx.send(AuditEvent::Rejected(rejection.clone()));
    }
}

/// Audit sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
    rejections: Mutex<Vec<Rejection>>,
}

impl MemoryAuditSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of dispatch records, in arrival order
    pub fn records(&self) -> Vec<AuditRecord> {
        lock(&self.records).clone()
    }

    /// Snapshot of rejections, in arrival order
    pub fn rejections(&self) -> Vec<Rejection> {
        lock(&self.rejections).clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        lock(&self.records).push(record.clone());
    }

    fn reject(&self, rejection: &Rejection) {
        lock(&self.rejections).push(rejection.clone());
    }
}

/// Audit sink that aggregates a summary and forwards to an inner sink
pub struct AggregatingAuditSink {
    inner: Arc<dyn AuditSink>,
    aggregator: Mutex<AuditAggregator>,
}

impl AggregatingAuditSink {
    pub fn new(inner: Arc<dyn AuditSink>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            aggregator: Mutex::new(AuditAggregator::new()),
        })
    }

    /// Current summary
    pub fn summary(&self) -> AuditSummary {
        lock(&self.aggregator).summary()
    }
}

impl AuditSink for AggregatingAuditSink {
    fn record(&self, record: &AuditRecord) {
        lock(&self.aggregator).update(record);
        self.inner.record(record);
    }

    fn reject(&self, rejection: &Rejection) {
        lock(&self.aggregator).update_rejection(rejection);
        self.inner.reject(rejection);
    }
}

// Poisoned locks still guard valid data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
