//! Broker frames and wire payload schemas.
//!
//! The transport speaks a small message-broker protocol with four frame
//! kinds; frame and body payloads are JSON. Two payload schema conventions
//! exist in the wild (broadcast and room deployments); both are modeled here
//! and unified by the dialect adapter.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Frames exchanged with the message broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Client handshake, sent once per established transport.
    Connect {
        /// Session id identifying this widget activation.
        session_id: String,
    },

    /// Attach to a destination; the broker starts delivering its messages.
    Subscribe {
        /// Destination to attach to.
        destination: String,
    },

    /// Publish a payload to an application destination.
    Send {
        /// Application destination to publish to.
        destination: String,
        /// JSON payload in the active dialect's schema.
        body: serde_json::Value,
    },

    /// Broker-delivered payload for a subscribed destination.
    Message {
        /// Destination the payload arrived on.
        destination: String,
        /// JSON payload in the active dialect's schema.
        body: serde_json::Value,
    },
}

impl Frame {
    /// Encode a frame as its JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a frame from its JSON wire form.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decode a frame from raw bytes.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Broadcast-mode payload: all clients share one destination and the sender
/// is a bare `"USER"`/`"AI"` label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastPayload {
    pub id: String,
    pub content: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
}

/// Room-mode payload: per-room destinations with sender identity and a
/// `messageType` discriminator.
///
/// Room backends store ids as database `Long`s, so `id` and `senderId`
/// arrive as JSON numbers; both are normalized to strings on decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    /// Message id. Some backends omit it; the first observer then assigns one.
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub room_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    pub message_type: String,
    #[serde(default)]
    pub content: String,
    pub sent_at: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Number(i64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Text(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

fn opt_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<StringOrNumber>::deserialize(deserializer)?;
    Ok(raw.map(StringOrNumber::into_string))
}

/// Parse a wire timestamp: RFC 3339 when the backend includes a zone, or a
/// bare local-datetime (`2024-01-01T10:00:00`) treated as UTC.
pub fn parse_wire_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| Error::Protocol(format!("invalid timestamp {raw:?}: {e}")))
}
