//! Payload schema adapter between the transcript model and the two backend
//! conventions.
//!
//! Broadcast deployments share a single public destination and tag senders
//! with a bare `"USER"`/`"AI"` label. Room deployments use per-room
//! destinations with explicit sender identity and a `messageType`
//! discriminator. Everything above this module works with [`ChatMessage`]
//! and [`InboundEvent`] only.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{parse_wire_timestamp, BroadcastPayload, RoomPayload};
use crate::session::ChatSession;
use crate::types::{ChatMessage, MessageId, SenderKind};

/// Which wire payload schema the backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolDialect {
    /// Single shared destination, `"USER"`/`"AI"` sender labels.
    Broadcast,
    /// Per-room destinations, sender identity plus `messageType`.
    Room,
}

/// A decoded inbound payload, normalized across dialects.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A participant joined the room.
    Join { sender_name: String },
    /// A regular chat message.
    ChatText(ChatMessage),
    /// A backend-originated announcement.
    SystemNotice { content: String },
}

impl ProtocolDialect {
    /// Whether this dialect needs a provisioned room before connecting.
    pub fn requires_room(&self) -> bool {
        matches!(self, ProtocolDialect::Room)
    }

    /// Destination the widget subscribes to for inbound messages.
    pub fn subscribe_destination(&self, session: &ChatSession) -> Result<String> {
        match self {
            ProtocolDialect::Broadcast => Ok("/topic/public".to_string()),
            ProtocolDialect::Room => {
                let room_id = session
                    .room_id
                    .as_deref()
                    .ok_or_else(|| Error::Session("no room provisioned".to_string()))?;
                Ok(format!("/topic/room/{room_id}"))
            }
        }
    }

    /// Destination outbound messages are published to.
    pub fn send_destination(&self, session: &ChatSession) -> Result<String> {
        match self {
            ProtocolDialect::Broadcast => Ok("/app/chat.sendMessage".to_string()),
            ProtocolDialect::Room => {
                let room_id = session
                    .room_id
                    .as_deref()
                    .ok_or_else(|| Error::Session("no room provisioned".to_string()))?;
                Ok(format!("/app/chat/{room_id}/send"))
            }
        }
    }

    /// Encode an outgoing message into this dialect's payload schema.
    pub fn encode_outbound(
        &self,
        session: &ChatSession,
        msg: &ChatMessage,
    ) -> Result<serde_json::Value> {
        match self {
            ProtocolDialect::Broadcast => {
                let payload = BroadcastPayload {
                    id: msg.id.to_string(),
                    content: msg.content.clone(),
                    sender: SenderKind::User.as_str().to_string(),
                    timestamp: msg.sent_at,
                };
                Ok(serde_json::to_value(payload)?)
            }
            ProtocolDialect::Room => {
                let room_id = session
                    .room_id
                    .as_deref()
                    .ok_or_else(|| Error::Session("no room provisioned".to_string()))?;
                let payload = RoomPayload {
                    id: Some(msg.id.to_string()),
                    room_id: room_id.to_string(),
                    sender_id: session.user_id.clone(),
                    sender_name: session.display_name.clone(),
                    message_type: "CHAT".to_string(),
                    content: msg.content.clone(),
                    sent_at: msg.sent_at.to_rfc3339(),
                };
                Ok(serde_json::to_value(payload)?)
            }
        }
    }

    /// Decode an inbound payload into a normalized event.
    ///
    /// Sender attribution is resolved here: in room mode a payload whose
    /// `senderId` matches the session's own user id is the broker echo of a
    /// local send and keeps its `User` attribution.
    pub fn decode_inbound(
        &self,
        session: &ChatSession,
        body: &serde_json::Value,
    ) -> Result<InboundEvent> {
        match self {
            ProtocolDialect::Broadcast => {
                let payload: BroadcastPayload = serde_json::from_value(body.clone())?;
                let sender_kind = match payload.sender.as_str() {
                    "USER" => SenderKind::User,
                    "AI" => SenderKind::Ai,
                    "SYSTEM" => {
                        return Ok(InboundEvent::SystemNotice {
                            content: payload.content,
                        })
                    }
                    other => {
                        return Err(Error::Protocol(format!("unknown sender label {other:?}")))
                    }
                };
                Ok(InboundEvent::ChatText(ChatMessage {
                    id: MessageId::from(payload.id),
                    content: payload.content,
                    sender_name: sender_kind.as_str().to_string(),
                    sender_kind,
                    sent_at: payload.timestamp,
                    sequence: 0,
                }))
            }
            ProtocolDialect::Room => {
                let payload: RoomPayload = serde_json::from_value(body.clone())?;
                match payload.message_type.as_str() {
                    "JOIN" => Ok(InboundEvent::Join {
                        sender_name: payload.sender_name,
                    }),
                    "CHAT" => {
                        let sender_kind = if payload.sender_id == session.user_id {
                            SenderKind::User
                        } else {
                            SenderKind::Agent
                        };
                        // Some backends omit message ids; assign one here so
                        // the store can still deduplicate.
                        let id = payload
                            .id
                            .map(MessageId::from)
                            .unwrap_or_else(MessageId::new);
                        Ok(InboundEvent::ChatText(ChatMessage {
                            id,
                            content: payload.content,
                            sender_kind,
                            sender_name: payload.sender_name,
                            sent_at: parse_wire_timestamp(&payload.sent_at)?,
                            sequence: 0,
                        }))
                    }
                    other => Err(Error::Protocol(format!(
                        "unknown message type {other:?}"
                    ))),
                }
            }
        }
    }
}
