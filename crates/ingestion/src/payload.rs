//! Wire payload decoding
//!
//! Inbound payloads are flat JSON objects:
//! `{"type": "EMAIL", "to": "a@b.com", "subject": "Hi", "body": "hello"}`.

use contracts::{ContractError, NotificationMessage};
use serde::Deserialize;
use serde_json::Value;

use crate::error::IngestionError;

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(rename = "type")]
    channel: String,
    to: String,
    #[serde(default)]
    subject: Option<String>,
    body: String,
}

/// Decode and validate one raw payload
///
/// # Errors
/// - `MalformedPayload`: not JSON, not an object, a required field missing or
///   not a string
/// - `InvalidMessage`: a required field is blank
pub fn decode(raw: &str) -> Result<NotificationMessage, IngestionError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| IngestionError::malformed(e.to_string()))?;

    // Derived struct deserialization also accepts arrays.
    if !value.is_object() {
        return Err(IngestionError::malformed(format!(
            "expected a JSON object, found {}",
            json_type(&value)
        )));
    }

    let wire: WirePayload =
        serde_json::from_value(value).map_err(|e| IngestionError::malformed(e.to_string()))?;

    let channel = Some(wire.channel.trim().to_string()).filter(|c| !c.is_empty());
    NotificationMessage::new(wire.channel, wire.to, wire.subject, wire.body).map_err(|e| match e {
        ContractError::InvalidMessage { message } => {
            IngestionError::InvalidMessage { channel, message }
        }
        other => IngestionError::malformed(other.to_string()),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
