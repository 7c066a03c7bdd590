use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval, Instant};
use tracing::{debug, info};

use super::broadcast::RoomBroadcaster;
use super::messages::ServerMessage;

/// Configuration for typing indicator expiry
#[derive(Debug, Clone)]
pub struct TypingConfig {
    /// How long a typing flag stays up without renewal
    pub expiry_window: Duration,
    /// How often the sweep task scans for expired flags
    pub sweep_interval: Duration,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            expiry_window: Duration::from_secs(3),
            sweep_interval: Duration::from_millis(500),
        }
    }
}

impl TypingConfig {
    /// Reads overrides from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let expiry_window = std::env::var("TYPING_EXPIRY_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.expiry_window);

        Self {
            expiry_window,
            ..defaults
        }
    }
}

/// Flat expiry table for typing flags: one entry per (room, user) pair holding
/// the deadline after which the flag self-clears. A single sweep task scans the
/// table instead of arming one timer per active typist.
pub struct TypingTracker {
    entries: Mutex<HashMap<(String, String), Instant>>,
    window: Duration,
}

impl TypingTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// (Re)arms the expiry deadline for the pair; repeated signals refresh the
    /// deadline, they never stack
    pub async fn arm(&self, room_id: &str, user_id: &str) {
        let deadline = Instant::now() + self.window;
        let mut entries = self.entries.lock().unwrap();
        entries.insert((room_id.to_string(), user_id.to_string()), deadline);
    }

    /// Clears the pending flag. Returns whether one was armed.
    pub async fn clear(&self, room_id: &str, user_id: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        entries
            .remove(&(room_id.to_string(), user_id.to_string()))
            .is_some()
    }

    /// Drops every pending flag owned by the user. Returns the affected rooms.
    pub async fn clear_user(&self, user_id: &str) -> Vec<String> {
        let mut entries = self.entries.lock().unwrap();
        let mut rooms = Vec::new();
        entries.retain(|(room_id, owner), _| {
            if owner == user_id {
                rooms.push(room_id.clone());
                false
            } else {
                true
            }
        });
        rooms
    }

    /// Removes and returns the (room, user) pairs whose deadline has passed
    pub async fn take_expired(&self) -> Vec<(String, String)> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let mut expired = Vec::new();
        entries.retain(|key, deadline| {
            if *deadline <= now {
                expired.push(key.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    pub async fn pending_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Background task that self-heals typing flags clients never cleared: expired
/// entries synthesize a `typing: false` broadcast to the room, sender excluded.
pub async fn start_typing_sweep(
    tracker: Arc<TypingTracker>,
    broadcaster: Arc<RoomBroadcaster>,
    config: TypingConfig,
) {
    info!(
        expiry_window_ms = config.expiry_window.as_millis() as u64,
        sweep_interval_ms = config.sweep_interval.as_millis() as u64,
        "Starting typing indicator sweep task"
    );

    let mut sweep = interval(config.sweep_interval);

    loop {
        sweep.tick().await;

        for (room_id, user_id) in tracker.take_expired().await {
            debug!(
                room_id = %room_id,
                user_id = %user_id,
                "Typing flag expired without renewal, clearing for the room"
            );
            let cleared = ServerMessage::typing(&room_id, &user_id, false);
            broadcaster
                .broadcast_to_room(&room_id, &cleared, Some(&user_id))
                .await;
        }
    }
}
