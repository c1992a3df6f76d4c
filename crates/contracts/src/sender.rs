//! ChannelSender trait - delivery capability consumed by the dispatcher
//!
//! One implementation per physical channel (log, outbox file, UDP relay, SMS provider, ...).

use thiserror::Error;

use crate::NotificationMessage;

/// Reason a single delivery attempt failed
///
/// The `Display` output is used verbatim as the audit `reason`, so every
/// variant renders a non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Provider answered but refused the message
    #[error("rejected by provider: {message}")]
    Rejected { message: String },

    /// Network / IO failure talking to the provider
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Attempt exceeded the configured delivery timeout
    #[error("delivery timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Sender queue is full, message not accepted
    #[error("sender '{sender}' queue full")]
    QueueFull { sender: String },

    /// Sender worker stopped or the delivery task aborted
    #[error("sender '{sender}' unavailable: {message}")]
    Unavailable { sender: String, message: String },
}

impl DeliveryError {
    /// Create provider rejection error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create worker unavailable error
    pub fn unavailable(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            sender: sender.into(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Channel delivery trait
///
/// All sender implementations must implement this trait. Implementations are
/// shared across concurrent deliveries, so `deliver` takes `&self`.
#[trait_variant::make(ChannelSender: Send)]
pub trait LocalChannelSender {
    /// Channel identifier this sender serves (matched case-insensitively)
    fn identifier(&self) -> &str;

    /// Sender name (used for logging/metrics/configuration errors)
    fn name(&self) -> &str {
        self.identifier()
    }

    /// Attempt delivery of one message
    ///
    /// # Errors
    /// Returns the failure reason; the caller never retries.
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError>;
}
