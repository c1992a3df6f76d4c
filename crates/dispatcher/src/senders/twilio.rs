//! TwilioSender - SMS / WhatsApp delivery through the Twilio REST API

use std::collections::HashMap;
use std::time::Duration;

use contracts::{ChannelSender, DeliveryError, NotificationMessage};
use reqwest::Client;
use tracing::{debug, instrument, warn};

const DEFAULT_API_BASE: &str = "https://api.twilio.com";

/// Twilio messaging mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TwilioMode {
    #[default]
    Sms,
    /// Addresses get the `whatsapp:` prefix
    WhatsApp,
}

impl TwilioMode {
    fn address(self, raw: &str) -> String {
        match self {
            Self::Sms => raw.to_string(),
            Self::WhatsApp if raw.starts_with("whatsapp:") => raw.to_string(),
            Self::WhatsApp => format!("whatsapp:{raw}"),
        }
    }
}

/// Configuration for TwilioSender
#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number or WhatsApp-enabled number
    pub from: String,
    pub api_base: String,
    pub mode: TwilioMode,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from", &self.from)
            .field("api_base", &self.api_base)
            .field("mode", &self.mode)
            .finish()
    }
}

impl TwilioConfig {
    /// Create config from params map
    ///
    /// `account_sid` / `auth_token` fall back to `TWILIO_ACCOUNT_SID` /
    /// `TWILIO_AUTH_TOKEN` so secrets can stay out of the config file.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let account_sid = param_or_env(params, "account_sid", "TWILIO_ACCOUNT_SID")?;
        let auth_token = param_or_env(params, "auth_token", "TWILIO_AUTH_TOKEN")?;
        let from = params
            .get("from")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or_else(|| "missing 'from' parameter".to_string())?;

        let mode = match params.get("mode").map(String::as_str) {
            Some("sms") | None => TwilioMode::Sms,
            Some("whatsapp") => TwilioMode::WhatsApp,
            Some(other) => return Err(format!("unknown mode '{}'", other)),
        };

        let api_base = params
            .get("api_base")
            .cloned()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            account_sid,
            auth_token,
            from,
            api_base,
            mode,
        })
    }

    fn messages_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!(
            "{base}/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        )
    }
}

fn param_or_env(
    params: &HashMap<String, String>,
    key: &str,
    env_key: &str,
) -> Result<String, String> {
    params
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .or_else(|| std::env::var(env_key).ok().filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| format!("missing '{key}' parameter (or {env_key})"))
}

/// Sender that posts messages to Twilio
pub struct TwilioSender {
    name: String,
    channel: String,
    config: TwilioConfig,
    http: Client,
}

impl TwilioSender {
    pub fn new(
        name: impl Into<String>,
        channel: impl Into<String>,
        config: TwilioConfig,
    ) -> Result<Self, String> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| format!("http client: {e}"))?;

        Ok(Self {
            name: name.into(),
            channel: channel.into(),
            config,
            http,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        channel: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, String> {
        Self::new(name, channel, TwilioConfig::from_params(params)?)
    }

    fn form(&self, message: &NotificationMessage) -> [(&'static str, String); 3] {
        let body = match message.subject() {
            Some(subject) => format!("{subject}\n{}", message.body()),
            None => message.body().to_string(),
        };
        [
            ("To", self.config.mode.address(message.recipient())),
            ("From", self.config.mode.address(&self.config.from)),
            ("Body", body),
        ]
    }
}

impl ChannelSender for TwilioSender {
    fn identifier(&self) -> &str {
        &self.channel
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "twilio_sender_deliver",
        skip(self, message),
        fields(sender = %self.name, mode = ?self.config.mode)
    )]
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(self.config.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&self.form(message))
            .send()
            .await
            .map_err(|e| DeliveryError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                sender = %self.name,
                status = status.as_u16(),
                "Twilio refused message"
            );
            return Err(DeliveryError::rejected(format!(
                "status={} body={}",
                status.as_u16(),
                body
            )));
        }

        debug!(sender = %self.name, status = status.as_u16(), "Twilio accepted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn params(api_base: &str) -> HashMap<String, String> {
        HashMap::from([
            ("account_sid".to_string(), "AC123".to_string()),
            ("auth_token".to_string(), "secret".to_string()),
            ("from".to_string(), "+15550001".to_string()),
            ("api_base".to_string(), api_base.to_string()),
        ])
    }

    /// One-shot HTTP server answering with `status`, returns the raw request
    async fn serve_once(status: u16) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = Vec::new();
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .map(str::to_ascii_lowercase)
                        .find_map(|line| {
                            line.strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status} X\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}"
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (base, handle)
    }

    #[test]
    fn test_config_requires_from() {
        let mut p = params("http://localhost");
        p.remove("from");
        let err = TwilioConfig::from_params(&p).unwrap_err();
        assert!(err.contains("from"));
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = TwilioConfig::from_params(&params("http://localhost")).unwrap();
        let text = format!("{config:?}");
        assert!(!text.contains("secret"));
        assert!(config
            .messages_url()
            .ends_with("/2010-04-01/Accounts/AC123/Messages.json"));
    }

    #[test]
    fn test_whatsapp_prefix() {
        assert_eq!(TwilioMode::WhatsApp.address("+1555"), "whatsapp:+1555");
        assert_eq!(TwilioMode::WhatsApp.address("whatsapp:+1555"), "whatsapp:+1555");
        assert_eq!(TwilioMode::Sms.address("+1555"), "+1555");
    }

    #[tokio::test]
    async fn test_twilio_deliver_posts_form() {
        let (base, server) = serve_once(201).await;
        let sender = TwilioSender::from_params("twilio", "SMS", &params(&base)).unwrap();
        let msg = NotificationMessage::new("SMS", "+15559999", None, "code 1234").unwrap();

        sender.deliver(&msg).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /2010-04-01/Accounts/AC123/Messages.json"));
        assert!(request.contains("To=%2B15559999"));
        assert!(request.contains("Body=code+1234"));
    }

    #[tokio::test]
    async fn test_twilio_non_success_is_rejected() {
        let (base, server) = serve_once(400).await;
        let sender = TwilioSender::from_params("twilio", "SMS", &params(&base)).unwrap();
        let msg = NotificationMessage::new("SMS", "+15559999", None, "hi").unwrap();

        let err = sender.deliver(&msg).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected { .. }));
        server.await.unwrap();
    }
}
