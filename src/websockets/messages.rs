use serde::{Deserialize, Serialize};

use crate::store::MessageProjection;

/// Message types a client may send after the handshake
pub const KNOWN_CLIENT_TYPES: &[&str] = &["join_room", "leave_room", "typing", "ping"];

/// Client-to-server envelopes, tagged by `type` on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom { room_id: String },
    LeaveRoom { room_id: String },
    Typing { room_id: String, is_typing: bool },
    Ping,
}

/// Server-to-client envelopes, tagged by `type` on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        user_id: String,
    },
    RoomJoined {
        room_id: String,
    },
    Typing {
        room_id: String,
        user_id: String,
        is_typing: bool,
    },
    Error {
        error: String,
    },
    Pong,
    NewMessage {
        room_id: String,
        message: MessageProjection,
    },
    MessageUpdated {
        room_id: String,
        message: MessageProjection,
    },
    /// Carries only the identifier so deleted content is never re-sent
    MessageDeleted {
        room_id: String,
        message_id: String,
    },
    UserOnline {
        user_id: String,
    },
    UserOffline {
        user_id: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn typing(room_id: &str, user_id: &str, is_typing: bool) -> Self {
        Self::Typing {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            is_typing,
        }
    }

    /// Serialize for the wire
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

/// Why an inbound frame could not be turned into a [`ClientMessage`]
#[derive(Debug, PartialEq)]
pub enum InboundError {
    /// Envelope parsed but the type is not one we dispatch
    UnknownType(String),
    /// Not valid JSON, or required fields are missing
    Malformed(String),
}

/// Parses an inbound text frame, distinguishing an unrecognized `type`
/// (reported back to the client by name) from plain garbage
pub fn parse_client_message(raw: &str) -> Result<ClientMessage, InboundError> {
    match serde_json::from_str::<ClientMessage>(raw) {
        Ok(message) => Ok(message),
        Err(e) => {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
                if let Some(message_type) = value.get("type").and_then(|t| t.as_str()) {
                    if !KNOWN_CLIENT_TYPES.contains(&message_type) {
                        return Err(InboundError::UnknownType(message_type.to_string()));
                    }
                }
            }
            Err(InboundError::Malformed(e.to_string()))
        }
    }
}
