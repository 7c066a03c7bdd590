use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted chat room as read from the chat store
///
/// The participant list is the authoritative access list; in-process room
/// membership (who currently receives broadcasts) is tracked separately and
/// never written back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomRecord {
    pub id: String,
    pub name: String,
    pub participants: Vec<String>, // User ids allowed into this room
    pub created_at: DateTime<Utc>,
}

impl RoomRecord {
    /// Check if a user is on the persisted participant list
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.contains(&user_id.to_string())
    }
}

/// Sender identity embedded in a message projection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageSender {
    pub id: String,
    pub display_name: String,
}

/// Preview of the message a reply points at
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplyPreview {
    pub id: String,
    pub body: String,
    pub sender_name: String,
}

/// Read-only message projection enriched with sender identity and reply target,
/// shaped for direct inclusion in a notification envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageProjection {
    pub id: String,
    pub room_id: String,
    pub sender: MessageSender,
    pub body: String,
    pub reply_to: Option<ReplyPreview>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_participant() {
        let room = RoomRecord {
            id: "room-1".to_string(),
            name: "dispatch".to_string(),
            participants: vec!["alice".to_string(), "bob".to_string()],
            created_at: Utc::now(),
        };

        assert!(room.has_participant("alice"));
        assert!(room.has_participant("bob"));
        assert!(!room.has_participant("mallory"));
    }

    #[test]
    fn test_message_projection_serialization() {
        let message = MessageProjection {
            id: "msg-1".to_string(),
            room_id: "room-1".to_string(),
            sender: MessageSender {
                id: "alice".to_string(),
                display_name: "Alice".to_string(),
            },
            body: "shipment 4411 is delayed".to_string(),
            reply_to: None,
            created_at: Utc::now(),
            edited_at: None,
        };

        let json = serde_json::to_string(&message).unwrap();
        let back: MessageProjection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }
}
