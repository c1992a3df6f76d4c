//! Dispatcher error types

use contracts::{ChannelId, DeliveryError, ErrorKind};
use thiserror::Error;

/// Registry construction errors (fatal at startup)
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Two senders declare the same case-folded channel
    #[error(
        "duplicate channel '{channel}': sender '{existing}' and sender '{duplicate}' both declare it"
    )]
    DuplicateChannel {
        channel: ChannelId,
        existing: String,
        duplicate: String,
    },

    /// Sender declares a blank channel identifier
    #[error("sender '{name}' declares an empty channel identifier")]
    EmptyChannel { name: String },

    /// Sender creation error
    #[error("failed to create sender '{name}': {message}")]
    SenderCreation { name: String, message: String },

    /// Error from contract
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create a sender creation error
    pub fn sender_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SenderCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Non-fatal routing failures, converted into audit records
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No sender registered for the channel
    #[error("no sender registered for channel '{channel}'")]
    Unroutable { channel: ChannelId },

    /// Resolved sender failed to deliver
    #[error("sender '{sender}' failed: {source}")]
    Delivery {
        sender: String,
        #[source]
        source: DeliveryError,
    },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unroutable { .. } => ErrorKind::UnroutableChannel,
            Self::Delivery { .. } => ErrorKind::DeliveryFailure,
        }
    }
}
