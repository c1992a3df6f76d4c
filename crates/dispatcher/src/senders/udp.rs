//! UdpSender - fire-and-forget relay of notifications over UDP

use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::Utc;
use contracts::{ChannelSender, DeliveryError, NotificationMessage};
use serde::Serialize;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

/// Serialization format for relay packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for UdpSender
#[derive(Debug, Clone)]
pub struct UdpSenderConfig {
    /// Relay address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: RelayFormat,
    /// Max packet size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl UdpSenderConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => RelayFormat::Bincode,
            Some("json") | None => RelayFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{}': {}", raw, e))?,
            None => 65000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Wire layout of one relay datagram
///
/// Every field is always written: bincode is positional, so an omitted
/// `subject` would shift the fields after it.
#[derive(Serialize)]
struct RelayPacket<'a> {
    sender: &'a str,
    sent_at_ms: i64,
    channel: &'a str,
    recipient: &'a str,
    subject: Option<&'a str>,
    body: &'a str,
}

impl<'a> RelayPacket<'a> {
    fn new(sender: &'a str, message: &'a NotificationMessage) -> Self {
        Self {
            sender,
            sent_at_ms: Utc::now().timestamp_millis(),
            channel: message.channel(),
            recipient: message.recipient(),
            subject: message.subject(),
            body: message.body(),
        }
    }
}

/// Sender that relays notifications to a downstream UDP listener
pub struct UdpSender {
    name: String,
    channel: String,
    config: UdpSenderConfig,
    socket: UdpSocket,
}

impl UdpSender {
    /// Create a new UdpSender bound to an ephemeral port
    #[instrument(name = "udp_sender_new", skip(name, channel, config))]
    pub async fn new(
        name: impl Into<String>,
        channel: impl Into<String>,
        config: UdpSenderConfig,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr = if config.addr.is_ipv6() {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(&config.addr).await?;

        debug!(
            sender = %name,
            target = %config.addr,
            "UdpSender connected"
        );

        Ok(Self {
            name,
            channel: channel.into(),
            config,
            socket,
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        channel: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, String> {
        let config = UdpSenderConfig::from_params(params)?;
        Self::new(name, channel, config)
            .await
            .map_err(|e| format!("socket setup failed: {e}"))
    }

    fn serialize_message(&self, message: &NotificationMessage) -> Result<Vec<u8>, String> {
        let packet = RelayPacket::new(&self.name, message);
        match self.config.format {
            RelayFormat::Json => {
                serde_json::to_vec(&packet).map_err(|e| format!("json error: {}", e))
            }
            RelayFormat::Bincode => {
                bincode::serialize(&packet).map_err(|e| format!("bincode error: {}", e))
            }
        }
    }

    fn prepare_payload(&self, message: &NotificationMessage) -> Result<Vec<u8>, DeliveryError> {
        let data = self
            .serialize_message(message)
            .map_err(DeliveryError::rejected)?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sender = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Packet too large, refusing"
            );
            return Err(DeliveryError::rejected(format!(
                "packet of {} bytes exceeds max_packet_size {}",
                data.len(),
                self.config.max_packet_size
            )));
        }

        Ok(data)
    }
}

impl ChannelSender for UdpSender {
    fn identifier(&self) -> &str {
        &self.channel
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "udp_sender_deliver",
        skip(self, message),
        fields(sender = %self.name, target = %self.config.addr)
    )]
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let data = self.prepare_payload(message)?;
        match self.socket.send(&data).await {
            Ok(sent) => {
                debug!(sender = %self.name, bytes = sent, "Sent");
                Ok(())
            }
            Err(e) => {
                error!(sender = %self.name, error = %e, "UDP send failed");
                Err(DeliveryError::transport(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct ReceivedPacket {
        sender: String,
        sent_at_ms: i64,
        channel: String,
        recipient: String,
        subject: Option<String>,
        body: String,
    }

    fn message() -> NotificationMessage {
        NotificationMessage::new("PUSH", "device-1", None, "ping").unwrap()
    }

    #[test]
    fn test_udp_config_parsing() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());
        params.insert("format".to_string(), "bincode".to_string());

        let config = UdpSenderConfig::from_params(&params).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.format, RelayFormat::Bincode);
        assert_eq!(config.max_packet_size, 65000);
    }

    #[test]
    fn test_udp_config_errors() {
        assert!(UdpSenderConfig::from_params(&HashMap::new()).is_err());

        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());
        params.insert("format".to_string(), "xml".to_string());
        let err = UdpSenderConfig::from_params(&params).unwrap_err();
        assert!(err.contains("xml"));
    }

    #[tokio::test]
    async fn test_udp_sender_delivers_to_listener() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = UdpSenderConfig {
            addr: listener.local_addr().unwrap(),
            format: RelayFormat::Json,
            max_packet_size: 65000,
        };

        let sender = UdpSender::new("relay", "push", config).await.unwrap();
        sender.deliver(&message()).await.unwrap();

        let mut buf = vec![0u8; 65536];
        let len = listener.recv(&mut buf).await.unwrap();
        let packet: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(packet["sender"], "relay");
        assert_eq!(packet["recipient"], "device-1");
        assert_eq!(packet["body"], "ping");
        assert!(packet["subject"].is_null());
    }

    #[tokio::test]
    async fn test_udp_sender_bincode_keeps_field_layout() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = UdpSenderConfig {
            addr: listener.local_addr().unwrap(),
            format: RelayFormat::Bincode,
            max_packet_size: 65000,
        };
        let sender = UdpSender::new("relay", "push", config).await.unwrap();

        let with_subject =
            NotificationMessage::new("PUSH", "device-2", Some("Alert".into()), "pong").unwrap();
        sender.deliver(&message()).await.unwrap();
        sender.deliver(&with_subject).await.unwrap();

        let mut buf = vec![0u8; 65536];
        let len = listener.recv(&mut buf).await.unwrap();
        let first: ReceivedPacket = bincode::deserialize(&buf[..len]).unwrap();
        assert_eq!(first.sender, "relay");
        assert!(first.sent_at_ms > 0);
        assert_eq!(first.channel, "PUSH");
        assert_eq!(first.recipient, "device-1");
        assert_eq!(first.subject, None);
        assert_eq!(first.body, "ping");

        let len = listener.recv(&mut buf).await.unwrap();
        let second: ReceivedPacket = bincode::deserialize(&buf[..len]).unwrap();
        assert_eq!(second.subject.as_deref(), Some("Alert"));
        assert_eq!(second.body, "pong");
    }

    #[tokio::test]
    async fn test_udp_sender_refuses_oversized_packet() {
        let config = UdpSenderConfig {
            addr: "127.0.0.1:19998".parse().unwrap(),
            format: RelayFormat::Json,
            max_packet_size: 16,
        };

        let sender = UdpSender::new("relay", "push", config).await.unwrap();
        let err = sender.deliver(&message()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected { .. }));
    }
}
