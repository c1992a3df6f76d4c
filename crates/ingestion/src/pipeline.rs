//! Ingestion Pipeline main entry

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_channel::bounded;
use contracts::{AuditRecord, AuditSink, ErrorKind, MessageSource, Rejection};
use dispatcher::Dispatcher;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{IngestionConfig, IngestionMetrics, MetricsSnapshot};
use crate::error::IngestionError;
use crate::payload;

/// Result of one `on_message` call
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Reached the dispatcher; carries its audit record
    Dispatched(AuditRecord),
    /// Discarded before dispatch
    Rejected(Rejection),
}

impl IngestOutcome {
    pub fn record(&self) -> Option<&AuditRecord> {
        match self {
            Self::Dispatched(record) => Some(record),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Dispatched(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Ingestion Pipeline
///
/// Decodes raw payloads, validates them and forwards them to the dispatcher.
/// Nothing that goes wrong with a single payload escapes `on_message`.
/// Safe to share behind `Arc` across any number of tasks.
pub struct IngestionPipeline {
    dispatcher: Arc<Dispatcher>,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<IngestionMetrics>,
    config: IngestionConfig,
}

impl IngestionPipeline {
    /// Create a pipeline reporting rejections to the dispatcher's audit sink
    pub fn new(dispatcher: Arc<Dispatcher>, config: IngestionConfig) -> Self {
        Self {
            audit: dispatcher.audit_sink(),
            dispatcher,
            metrics: Arc::new(IngestionMetrics::new()),
            config,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Handle one inbound payload
    ///
    /// Malformed and invalid payloads produce a `Rejection`; everything else
    /// produces exactly one `AuditRecord`, including when the dispatch task
    /// panics.
    #[instrument(name = "ingestion_on_message", skip(self, raw), fields(bytes = raw.len()))]
    pub async fn on_message(&self, raw: &str) -> IngestOutcome {
        self.metrics.record_received();
        observability::record_payload_received();

        let message = match payload::decode(raw) {
            Ok(message) => message,
            Err(err) => return IngestOutcome::Rejected(self.reject(err)),
        };
        self.metrics.record_dispatched();

        let dispatcher = Arc::clone(&self.dispatcher);
        let task_message = message.clone();
        let joined = tokio::spawn(async move { dispatcher.dispatch(&task_message).await }).await;

        let record = match joined {
            Ok(record) => record,
            Err(join_err) => {
                let err = IngestionError::DispatchAborted {
                    message: join_err.to_string(),
                };
                error!(
                    channel = %message.channel_id(),
                    error = %err,
                    "Dispatch task aborted"
                );
                let record = AuditRecord::failed(&message, None, err.to_string(), Duration::ZERO);
                observability::record_dispatch(&record);
                self.audit.record(&record);
                record
            }
        };

        IngestOutcome::Dispatched(record)
    }

    /// Account for a payload the source could not hand over as text
    fn on_unreadable(&self, err: IngestionError) -> Rejection {
        self.metrics.record_received();
        observability::record_payload_received();
        self.reject(err)
    }

    fn reject(&self, err: IngestionError) -> Rejection {
        match err.kind() {
            ErrorKind::MalformedPayload => {
                self.metrics.record_malformed();
                error!(error = %err, "Malformed payload discarded");
            }
            _ => {
                self.metrics.record_invalid();
                warn!(error = %err, "Invalid message discarded");
            }
        }

        let rejection = err
            .to_rejection()
            .unwrap_or_else(|| Rejection::new(err.kind(), err.to_string(), None));
        observability::record_rejection(&rejection);
        self.audit.reject(&rejection);
        rejection
    }

    /// Drive a source to exhaustion with the worker pool
    pub async fn run<S>(self: &Arc<Self>, source: S) -> Result<MetricsSnapshot, IngestionError>
    where
        S: MessageSource,
    {
        self.run_until(source, std::future::pending::<()>()).await
    }

    /// Drive a source until it is exhausted or `shutdown` resolves
    ///
    /// Payloads already queued are still processed before returning.
    ///
    /// # Errors
    /// Source read failures; payload-level problems never fail the run.
    #[instrument(
        name = "ingestion_run",
        skip(self, source, shutdown),
        fields(source = %source.name(), workers = self.config.workers)
    )]
    pub async fn run_until<S, F>(
        self: &Arc<Self>,
        mut source: S,
        shutdown: F,
    ) -> Result<MetricsSnapshot, IngestionError>
    where
        S: MessageSource,
        F: Future<Output = ()>,
    {
        let (tx, rx) = bounded::<String>(self.config.queue_capacity.max(1));
        let worker_count = self.config.workers.max(1);

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let rx = rx.clone();
            let pipeline = Arc::clone(self);
            workers.spawn(async move {
                let mut handled: u64 = 0;
                while let Ok(raw) = rx.recv().await {
                    pipeline.on_message(&raw).await;
                    handled += 1;
                }
                debug!(worker_id, handled, "ingestion worker drained");
            });
        }
        drop(rx);

        info!(workers = worker_count, "ingestion started");

        tokio::pin!(shutdown);
        let read_result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping ingestion");
                    break Ok(());
                }
                next = source.next_payload() => match next {
                    Ok(Some(raw)) => {
                        if tx.send(raw).await.is_err() {
                            break Err(IngestionError::ChannelClosed);
                        }
                    }
                    Ok(None) => {
                        debug!("source exhausted");
                        break Ok(());
                    }
                    Err(e) if e.kind() == ErrorKind::MalformedPayload => {
                        self.on_unreadable(IngestionError::from(e));
                    }
                    Err(e) => break Err(IngestionError::from(e)),
                },
            }
        };

        tx.close();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "ingestion worker failed");
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            received = snapshot.received,
            dispatched = snapshot.dispatched,
            malformed = snapshot.malformed,
            invalid = snapshot.invalid,
            "ingestion finished"
        );

        read_result.map(|()| snapshot)
    }
}
