//! SmtpSender - email delivery through an SMTP relay

use std::collections::HashMap;
use std::time::Duration;

use contracts::{ChannelSender, DeliveryError, NotificationMessage};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument, warn};

const DEFAULT_SMTP_PORT: u16 = 587;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for SmtpSender
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Upgrade the connection with STARTTLS; plain text otherwise
    pub starttls: bool,
    /// RFC 5322 "From" address
    pub from: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("starttls", &self.starttls)
            .field("from", &self.from)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SmtpConfig {
    /// Create config from params map
    ///
    /// `username` / `password` fall back to `SMTP_USER` / `SMTP_PASSWORD`.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let host = non_blank(params, "host").ok_or_else(|| "missing 'host' parameter".to_string())?;
        let from = non_blank(params, "from").ok_or_else(|| "missing 'from' parameter".to_string())?;
        from.parse::<Mailbox>()
            .map_err(|e| format!("invalid 'from' address '{from}': {e}"))?;

        let port = match params.get("port") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| format!("invalid port '{raw}'"))?,
            None => DEFAULT_SMTP_PORT,
        };

        let starttls = match params.get("starttls").map(String::as_str) {
            Some("true") | None => true,
            Some("false") => false,
            Some(other) => return Err(format!("invalid starttls flag '{other}'")),
        };

        Ok(Self {
            host,
            port,
            starttls,
            from,
            username: non_blank(params, "username").or_else(|| env_var("SMTP_USER")),
            password: non_blank(params, "password").or_else(|| env_var("SMTP_PASSWORD")),
        })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
        let mut builder = if self.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
                .map_err(|e| format!("smtp relay '{}': {e}", self.host))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
        };
        builder = builder.port(self.port).timeout(Some(CONNECT_TIMEOUT));

        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(builder.build())
    }
}

fn non_blank(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).filter(|v| !v.trim().is_empty()).cloned()
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Sender that hands messages to an SMTP relay
pub struct SmtpSender {
    name: String,
    channel: String,
    config: SmtpConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpSender {
    pub fn new(
        name: impl Into<String>,
        channel: impl Into<String>,
        config: SmtpConfig,
    ) -> Result<Self, String> {
        let mailer = config.transport()?;
        Ok(Self {
            name: name.into(),
            channel: channel.into(),
            config,
            mailer,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        channel: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, String> {
        Self::new(name, channel, SmtpConfig::from_params(params)?)
    }

    /// Build the plain-text mail for one notification
    ///
    /// An unparsable recipient is a permanent rejection.
    pub fn build_message(&self, message: &NotificationMessage) -> Result<Message, DeliveryError> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| DeliveryError::rejected(format!("invalid from address: {e}")))?;
        let to: Mailbox = message.recipient().parse().map_err(|e| {
            DeliveryError::rejected(format!(
                "invalid recipient '{}': {e}",
                message.recipient()
            ))
        })?;

        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .header(ContentType::TEXT_PLAIN);
        if let Some(subject) = message.subject() {
            builder = builder.subject(subject);
        }

        builder
            .body(message.body().to_string())
            .map_err(|e| DeliveryError::rejected(format!("email build: {e}")))
    }
}

impl ChannelSender for SmtpSender {
    fn identifier(&self) -> &str {
        &self.channel
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "smtp_sender_deliver",
        skip(self, message),
        fields(sender = %self.name, host = %self.config.host)
    )]
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let email = self.build_message(message)?;

        match self.mailer.send(email).await {
            Ok(response) => {
                debug!(
                    sender = %self.name,
                    code = %response.code(),
                    "SMTP relay accepted message"
                );
                Ok(())
            }
            Err(e) if e.is_permanent() => {
                warn!(sender = %self.name, error = %e, "SMTP relay refused message");
                Err(DeliveryError::rejected(e.to_string()))
            }
            Err(e) => Err(DeliveryError::transport(e.to_string())),
        }
    }
}
