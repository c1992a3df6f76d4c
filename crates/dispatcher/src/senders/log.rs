//! LogSender - writes notifications to the tracing stream

use contracts::{ChannelSender, DeliveryError, NotificationMessage};
use tracing::{info, instrument};

/// Sender that logs each notification instead of delivering it
///
/// Useful as a default sink for channels without a real provider yet.
pub struct LogSender {
    name: String,
    channel: String,
}

impl LogSender {
    /// Create a new LogSender serving `channel`
    pub fn new(name: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel: channel.into(),
        }
    }
}

impl ChannelSender for LogSender {
    fn identifier(&self) -> &str {
        &self.channel
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sender_deliver",
        skip(self, message),
        fields(sender = %self.name)
    )]
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        info!(
            sender = %self.name,
            channel = %message.channel_id(),
            recipient = message.recipient(),
            subject = message.subject().unwrap_or("-"),
            body_len = message.body().len(),
            "Notification logged"
        );
        Ok(())
    }
}
