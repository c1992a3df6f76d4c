//! FileSender - appends notifications to a per-channel JSON lines outbox

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use contracts::{ChannelSender, DeliveryError, NotificationMessage};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};

/// Configuration for FileSender
#[derive(Debug, Clone)]
pub struct FileSenderConfig {
    /// Outbox directory
    pub base_path: PathBuf,
}

impl FileSenderConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./outbox"));

        Self { base_path }
    }
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    timestamp: DateTime<Utc>,
    sender: &'a str,
    message: &'a NotificationMessage,
}

/// Sender that appends one JSON line per notification to `<base_path>/<channel>.jsonl`
pub struct FileSender {
    name: String,
    channel: String,
    path: PathBuf,
}

impl FileSender {
    /// Create a new FileSender, creating the outbox directory if needed
    pub fn new(
        name: impl Into<String>,
        channel: impl Into<String>,
        config: FileSenderConfig,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.base_path)?;

        let channel = channel.into();
        let path = config
            .base_path
            .join(format!("{}.jsonl", channel.trim().to_lowercase()));

        Ok(Self {
            name: name.into(),
            channel,
            path,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        channel: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, channel, FileSenderConfig::from_params(params))
    }

    /// Outbox file this sender appends to
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, message: &NotificationMessage) -> Result<Vec<u8>, DeliveryError> {
        let entry = OutboxEntry {
            timestamp: Utc::now(),
            sender: &self.name,
            message,
        };
        let mut line = serde_json::to_vec(&entry)
            .map_err(|e| DeliveryError::rejected(format!("json error: {e}")))?;
        line.push(b'\n');
        Ok(line)
    }

    async fn append(&self, line: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        // Single write per line keeps concurrent appends whole.
        file.write_all(line).await?;
        file.flush().await
    }
}

impl ChannelSender for FileSender {
    fn identifier(&self) -> &str {
        &self.channel
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sender_deliver",
        skip(self, message),
        fields(sender = %self.name, path = %self.path.display())
    )]
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let line = self.encode(message)?;
        self.append(&line).await.map_err(|e| {
            error!(sender = %self.name, error = %e, "Outbox append failed");
            DeliveryError::transport(e.to_string())
        })?;
        debug!(sender = %self.name, bytes = line.len(), "Outbox entry written");
        Ok(())
    }
}
