//! Layered error definitions
//!
//! Categorized by source: config / message / source

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes of the routing core
///
/// Everything except `Configuration` is recovered locally and turned into an
/// audit record or a rejection report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Raw input cannot be parsed into a message
    MalformedPayload,
    /// Parsed message violates the message invariants
    InvalidMessage,
    /// No sender registered for the message's channel
    UnroutableChannel,
    /// Sender attempted delivery and failed (including timeout)
    DeliveryFailure,
    /// Startup misconfiguration, such as duplicate channel identifiers
    Configuration,
}

impl ErrorKind {
    /// Only configuration errors may abort the process
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Configuration)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedPayload => "malformed_payload",
            Self::InvalidMessage => "invalid_message",
            Self::UnroutableChannel => "unroutable_channel",
            Self::DeliveryFailure => "delivery_failure",
            Self::Configuration => "configuration",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Message Errors =====
    /// Message violates the non-blank field invariant
    #[error("invalid message: {message}")]
    InvalidMessage { message: String },

    // ===== Source Errors =====
    /// One payload could not be read as text; later payloads are unaffected
    #[error("message source '{source_name}' yielded an unreadable payload: {message}")]
    UnreadablePayload {
        source_name: String,
        message: String,
    },

    /// Message source read error
    #[error("message source '{source_name}' error: {message}")]
    SourceRead {
        source_name: String,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid message error
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Create message source read error
    pub fn source_read(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceRead {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create unreadable payload error
    pub fn unreadable_payload(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnreadablePayload {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMessage { .. } => ErrorKind::InvalidMessage,
            Self::UnreadablePayload { .. } => ErrorKind::MalformedPayload,
            _ => ErrorKind::Configuration,
        }
    }
}
