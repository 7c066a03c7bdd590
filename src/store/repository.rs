use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::models::{MessageProjection, MessageSender, ReplyPreview, RoomRecord};
use crate::shared::AppError;

/// Read-only contract against the persisted chat data
///
/// Rooms and messages are owned by the back-office REST layer; the signaling
/// core only looks them up to authorize joins and enrich notifications.
#[async_trait]
pub trait ChatStore {
    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRecord>, AppError>;

    /// Fetches a message projection carrying sender identity and reply target
    async fn fetch_enriched_message(
        &self,
        message_id: &str,
    ) -> Result<Option<MessageProjection>, AppError>;
}

/// In-memory implementation of ChatStore for development and testing
///
/// Provides a realistic implementation without a database connection. Data is
/// seeded by the caller and lost when the process exits.
pub struct InMemoryChatStore {
    rooms: Mutex<HashMap<String, RoomRecord>>,
    messages: Mutex<HashMap<String, MessageProjection>>,
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChatStore {
    /// Creates a new empty in-memory store
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an in-memory store pre-populated with rooms
    pub fn with_rooms(rooms: Vec<RoomRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.rooms.lock().unwrap();
            for room in rooms {
                map.insert(room.id.clone(), room);
            }
        }
        store
    }

    pub fn add_room(&self, room: RoomRecord) {
        self.rooms.lock().unwrap().insert(room.id.clone(), room);
    }

    pub fn add_message(&self, message: MessageProjection) {
        self.messages
            .lock()
            .unwrap()
            .insert(message.id.clone(), message);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    #[instrument(skip(self))]
    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRecord>, AppError> {
        debug!(room_id = %room_id, "Fetching room from memory");

        let rooms = self.rooms.lock().unwrap();
        let room = rooms.get(room_id).cloned();

        match &room {
            Some(r) => debug!(room_id = %room_id, name = %r.name, "Room found in memory"),
            None => debug!(room_id = %room_id, "Room not found in memory"),
        }

        Ok(room)
    }

    #[instrument(skip(self))]
    async fn fetch_enriched_message(
        &self,
        message_id: &str,
    ) -> Result<Option<MessageProjection>, AppError> {
        debug!(message_id = %message_id, "Fetching message projection from memory");

        let messages = self.messages.lock().unwrap();
        Ok(messages.get(message_id).cloned())
    }
}

/// PostgreSQL implementation of the chat store
pub struct PostgresChatStore {
    pool: PgPool,
}

impl PostgresChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
        Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("malformed {} id", what)))
    }
}

#[async_trait]
impl ChatStore for PostgresChatStore {
    #[instrument(skip(self))]
    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRecord>, AppError> {
        debug!(room_id = %room_id, "Fetching room from database");
        let room_uuid = Self::parse_id(room_id, "room")?;

        let row = sqlx::query("SELECT id, name, created_at FROM chat_rooms WHERE id = $1")
            .bind(room_uuid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, room_id = %room_id, "Failed to fetch room from database");
                AppError::Database(e.to_string())
            })?;

        let Some(row) = row else {
            debug!(room_id = %room_id, "Room not found in database");
            return Ok(None);
        };

        let participant_rows =
            sqlx::query("SELECT user_id FROM chat_room_participants WHERE room_id = $1")
                .bind(room_uuid)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, room_id = %room_id, "Failed to fetch room participants");
                    AppError::Database(e.to_string())
                })?;

        let room = RoomRecord {
            id: row.get::<Uuid, _>("id").to_string(),
            name: row.get("name"),
            participants: participant_rows
                .iter()
                .map(|r| r.get::<Uuid, _>("user_id").to_string())
                .collect(),
            created_at: row.get("created_at"),
        };

        debug!(
            room_id = %room_id,
            participants = room.participants.len(),
            "Room found in database"
        );
        Ok(Some(room))
    }

    #[instrument(skip(self))]
    async fn fetch_enriched_message(
        &self,
        message_id: &str,
    ) -> Result<Option<MessageProjection>, AppError> {
        debug!(message_id = %message_id, "Fetching message projection from database");
        let message_uuid = Self::parse_id(message_id, "message")?;

        let row = sqlx::query(
            "SELECT m.id, m.room_id, m.body, m.created_at, m.edited_at, \
                    u.id AS sender_id, u.display_name AS sender_name, \
                    r.id AS reply_id, r.body AS reply_body, ru.display_name AS reply_sender_name \
             FROM chat_messages m \
             JOIN users u ON u.id = m.sender_id \
             LEFT JOIN chat_messages r ON r.id = m.reply_to_id \
             LEFT JOIN users ru ON ru.id = r.sender_id \
             WHERE m.id = $1",
        )
        .bind(message_uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, message_id = %message_id, "Failed to fetch message from database");
            AppError::Database(e.to_string())
        })?;

        let Some(row) = row else {
            debug!(message_id = %message_id, "Message not found in database");
            return Ok(None);
        };

        let reply_to = row
            .get::<Option<Uuid>, _>("reply_id")
            .map(|reply_id| ReplyPreview {
                id: reply_id.to_string(),
                body: row.get("reply_body"),
                sender_name: row.get("reply_sender_name"),
            });

        let message = MessageProjection {
            id: row.get::<Uuid, _>("id").to_string(),
            room_id: row.get::<Uuid, _>("room_id").to_string(),
            sender: MessageSender {
                id: row.get::<Uuid, _>("sender_id").to_string(),
                display_name: row.get("sender_name"),
            },
            body: row.get("body"),
            reply_to,
            created_at: row.get("created_at"),
            edited_at: row.get("edited_at"),
        };

        Ok(Some(message))
    }
}
