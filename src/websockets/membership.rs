use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory subscription table mapping rooms to the users currently attached
/// to their broadcast stream. Distinct from persisted room participation, which
/// the chat store owns; this table is rebuilt from scratch each process lifetime.
pub struct RoomMembership {
    rooms: RwLock<HashMap<String, HashSet<String>>>,
}

impl Default for RoomMembership {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomMembership {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    pub async fn join(&self, room_id: &str, user_id: &str) {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    /// Idempotent removal. Returns whether the user was subscribed.
    pub async fn leave(&self, room_id: &str, user_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room_id) else {
            return false;
        };
        let removed = members.remove(user_id);
        if members.is_empty() {
            rooms.remove(room_id);
        }
        removed
    }

    pub async fn is_member(&self, room_id: &str, user_id: &str) -> bool {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(|members| members.contains(user_id))
            .unwrap_or(false)
    }

    pub async fn members(&self, room_id: &str) -> Vec<String> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes the user from every room in one pass. Returns the rooms left.
    pub async fn purge_user(&self, user_id: &str) -> Vec<String> {
        let mut rooms = self.rooms.write().await;
        let mut left = Vec::new();

        rooms.retain(|room_id, members| {
            if members.remove(user_id) {
                left.push(room_id.clone());
            }
            !members.is_empty()
        });

        if !left.is_empty() {
            debug!(user_id = %user_id, rooms = left.len(), "Purged user from room subscriptions");
        }
        left
    }
}
