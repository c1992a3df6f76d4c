//! Audit records - one per dispatch attempt, one rejection per discarded payload

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChannelId, ErrorKind, NotificationMessage};

/// Dispatch outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Delivered,
    Failed,
    Unroutable,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Unroutable => "unroutable",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    /// Normalized channel
    pub channel: ChannelId,

    /// Message recipient
    pub recipient: String,

    pub outcome: Outcome,

    /// Present for `failed` and `unroutable`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Sender that handled the attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// Time spent in delivery (milliseconds)
    pub elapsed_ms: f64,

    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Successful delivery
    pub fn delivered(message: &NotificationMessage, sender: &str, elapsed: Duration) -> Self {
        Self {
            channel: message.channel_id(),
            recipient: message.recipient().to_string(),
            outcome: Outcome::Delivered,
            reason: None,
            sender: Some(sender.to_string()),
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            timestamp: Utc::now(),
        }
    }

    /// Failed delivery (sender error, timeout, queue full, aborted task)
    pub fn failed(
        message: &NotificationMessage,
        sender: Option<&str>,
        reason: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        let reason = reason.into();
        Self {
            channel: message.channel_id(),
            recipient: message.recipient().to_string(),
            outcome: Outcome::Failed,
            reason: Some(if reason.is_empty() {
                "delivery failed".to_string()
            } else {
                reason
            }),
            sender: sender.map(str::to_string),
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            timestamp: Utc::now(),
        }
    }

    /// No sender registered for the channel
    pub fn unroutable(message: &NotificationMessage) -> Self {
        let channel = message.channel_id();
        Self {
            reason: Some(format!("no sender registered for channel '{channel}'")),
            channel,
            recipient: message.recipient().to_string(),
            outcome: Outcome::Unroutable,
            sender: None,
            elapsed_ms: 0.0,
            timestamp: Utc::now(),
        }
    }

    /// Failure class, `None` when delivered
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.outcome {
            Outcome::Delivered => None,
            Outcome::Failed => Some(ErrorKind::DeliveryFailure),
            Outcome::Unroutable => Some(ErrorKind::UnroutableChannel),
        }
    }
}

/// Report for a payload discarded before dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    /// `MalformedPayload` or `InvalidMessage`
    pub kind: ErrorKind,

    pub reason: String,

    /// Raw channel when the payload parsed far enough to have one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Rejection {
    pub fn new(kind: ErrorKind, reason: impl Into<String>, channel: Option<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            channel,
            timestamp: Utc::now(),
        }
    }
}

/// Observability sink for audit output
///
/// The transport (log stream, channel, memory) is up to the implementation;
/// callers invoke `record` exactly once per dispatch attempt and `reject`
/// exactly once per discarded payload. Implementations must not block.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);

    fn reject(&self, rejection: &Rejection);
}
