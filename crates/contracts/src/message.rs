//! NotificationMessage - normalized message flowing from ingestion to senders

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;
use validator::{Validate, ValidationError};

use crate::ContractError;

/// Normalized channel identifier
///
/// Channels are case-insensitive: the identifier is trimmed and upper-cased,
/// so `"email"`, `" Email "` and `"EMAIL"` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Normalize a raw channel identifier
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    fn from(raw: &str) -> Self {
        Self::normalize(raw)
    }
}

/// Logical notification message
///
/// Immutable once built: `channel`, `recipient` and `body` are guaranteed
/// non-blank by [`NotificationMessage::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
pub struct NotificationMessage {
    /// Channel as received (case preserved)
    #[validate(custom(function = "not_blank"))]
    channel: String,

    /// Channel-dependent destination address
    #[validate(custom(function = "not_blank"))]
    recipient: String,

    /// Only meaningful for channels that use it
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,

    #[validate(custom(function = "not_blank"))]
    body: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("must not be blank")));
    }
    Ok(())
}

impl NotificationMessage {
    /// Build and validate a message
    ///
    /// An empty or whitespace-only subject is stored as `None`.
    ///
    /// # Errors
    /// `ContractError::InvalidMessage` naming every blank required field.
    pub fn new(
        channel: impl Into<String>,
        recipient: impl Into<String>,
        subject: Option<String>,
        body: impl Into<String>,
    ) -> Result<Self, ContractError> {
        let message = Self {
            channel: channel.into(),
            recipient: recipient.into(),
            subject: subject.filter(|s| !s.trim().is_empty()),
            body: body.into(),
        };

        if let Err(errors) = message.validate() {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|field| field.to_string())
                .collect();
            fields.sort();
            return Err(ContractError::invalid_message(format!(
                "blank required fields: {}",
                fields.join(", ")
            )));
        }

        Ok(message)
    }

    /// Channel exactly as received
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Normalized channel key used for routing
    pub fn channel_id(&self) -> ChannelId {
        ChannelId::normalize(&self.channel)
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
