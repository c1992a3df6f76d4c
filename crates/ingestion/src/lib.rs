//! # Ingestion Pipeline
//!
//! Notification ingestion module.
//!
//! Responsibilities:
//! - Decode raw JSON payloads into `NotificationMessage`
//! - Reject malformed / invalid payloads without stopping the pipeline
//! - Forward valid messages to the `Dispatcher`, containing any crash in the dispatch path
//! - Drive a `MessageSource` with a bounded worker pool (async-channel)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionConfig, IngestionPipeline, LineSource};
//!
//! let pipeline = Arc::new(IngestionPipeline::new(dispatcher, IngestionConfig::default()));
//!
//! // One payload at a time
//! let outcome = pipeline.on_message(r#"{"type":"EMAIL","to":"a@b.com","body":"hi"}"#).await;
//!
//! // Or a whole stream
//! let snapshot = pipeline.run(LineSource::stdin()).await?;
//! ```

mod config;
mod error;
pub mod mock;
mod payload;
mod pipeline;
mod source;

// Re-exports
pub use config::{IngestionConfig, IngestionMetrics, MetricsSnapshot};
pub use error::{IngestionError, Result};
pub use mock::MockMessageSource;
pub use payload::decode;
pub use pipeline::{IngestOutcome, IngestionPipeline};
pub use source::{ChannelSource, LineSource, PayloadSender};
