//! Dispatcher - routes each message to the sender registered for its channel

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{AuditRecord, AuditSink, DispatchSettings, NotificationMessage, RouterBlueprint};
use observability::TracingAuditSink;
use tracing::{debug, instrument, warn};

use crate::error::{DispatchError, DispatcherError};
use crate::metrics::MetricsSnapshot;
use crate::registry::{create_registry, SenderRegistry};

/// Dispatcher configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Upper bound for one delivery attempt
    pub delivery_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&DispatchSettings> for DispatcherConfig {
    fn from(settings: &DispatchSettings) -> Self {
        Self {
            delivery_timeout: Duration::from_millis(settings.delivery_timeout_ms),
        }
    }
}

/// Routes messages, never retries, never propagates delivery failures
///
/// Shared behind `Arc` by concurrent ingestion workers.
pub struct Dispatcher {
    registry: SenderRegistry,
    config: DispatcherConfig,
    audit: Arc<dyn AuditSink>,
}

impl Dispatcher {
    /// Create a dispatcher that audits through `TracingAuditSink`
    pub fn new(registry: SenderRegistry, config: DispatcherConfig) -> Self {
        Self {
            registry,
            config,
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Replace the audit sink
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn audit_sink(&self) -> Arc<dyn AuditSink> {
        Arc::clone(&self.audit)
    }

    pub fn registry(&self) -> &SenderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Get metrics for all senders
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.registry
            .metrics()
            .into_iter()
            .map(|(_, name, snapshot)| (name, snapshot))
            .collect()
    }

    /// Resolve and deliver, returning the name of the sender used
    ///
    /// # Errors
    /// `Unroutable` when no sender serves the channel, `Delivery` when the
    /// sender failed, timed out, was saturated or crashed.
    pub async fn route(&self, message: &NotificationMessage) -> Result<&str, DispatchError> {
        let channel = message.channel_id();
        let handle = self
            .registry
            .resolve_id(&channel)
            .ok_or(DispatchError::Unroutable { channel })?;

        handle
            .deliver(message, self.config.delivery_timeout)
            .await
            .map_err(|source| DispatchError::Delivery {
                sender: handle.name().to_string(),
                source,
            })?;

        Ok(handle.name())
    }

    /// Dispatch one message and report the outcome
    ///
    /// Exactly one `AuditRecord` is produced per call; it is handed to the
    /// audit sink, counted in Prometheus metrics and returned.
    #[instrument(
        name = "dispatch",
        skip(self, message),
        fields(channel = %message.channel_id(), recipient = message.recipient())
    )]
    pub async fn dispatch(&self, message: &NotificationMessage) -> AuditRecord {
        let start = Instant::now();

        let record = match self.route(message).await {
            Ok(sender) => {
                debug!(sender, "Delivered");
                AuditRecord::delivered(message, sender, start.elapsed())
            }
            Err(err) => {
                warn!(kind = %err.kind(), error = %err, "Dispatch did not deliver");
                match err {
                    DispatchError::Unroutable { .. } => AuditRecord::unroutable(message),
                    DispatchError::Delivery { sender, source } => AuditRecord::failed(
                        message,
                        Some(&sender),
                        source.to_string(),
                        start.elapsed(),
                    ),
                }
            }
        };

        observability::record_dispatch(&record);
        self.audit.record(&record);
        record
    }

    /// Stop all sender workers
    pub async fn shutdown(self) {
        self.registry.shutdown().await;
    }
}

/// Convenience function to create a dispatcher from a router blueprint
#[instrument(name = "dispatcher_create", skip(blueprint))]
pub async fn create_dispatcher(blueprint: &RouterBlueprint) -> Result<Dispatcher, DispatcherError> {
    let registry = create_registry(&blueprint.senders).await?;
    Ok(Dispatcher::new(
        registry,
        DispatcherConfig::from(&blueprint.dispatch),
    ))
}
