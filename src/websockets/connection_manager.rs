use async_trait::async_trait;
use axum::extract::ws::close_code;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::socket::Outbound;

/// Registry entry for a live, authenticated connection
#[derive(Clone)]
pub struct ConnectionHandle {
    pub connection_id: Uuid,
    pub sender: mpsc::UnboundedSender<Outbound>,
    pub alive: Arc<AtomicBool>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            sender,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }
}

#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Registers a connection under the user id. A previous registration for
    /// the same user is force-closed and replaced: newest connection wins.
    async fn register(&self, user_id: String, handle: ConnectionHandle);

    /// Removes the registration only if it still belongs to `connection_id`.
    /// Returns false when a newer handshake has already superseded it.
    async fn deregister(&self, user_id: &str, connection_id: Uuid) -> bool;

    /// Whether `connection_id` is still the live registration for the user
    async fn is_current(&self, user_id: &str, connection_id: Uuid) -> bool;

    /// Resets the liveness flag, typically on an application-level ping
    async fn mark_alive(&self, user_id: &str);

    async fn send_to_user(&self, user_id: &str, message: &str);

    async fn send_to_users(&self, user_ids: &[String], message: &str);

    async fn online_user_ids(&self) -> Vec<String>;

    async fn connection_count(&self) -> usize;

    /// Liveness pass: terminates connections whose flag was never reset since
    /// the previous pass and probes the rest. Returns the terminated user ids
    /// so the caller can run the disconnect cleanup cascade for them.
    async fn sweep_dead(&self) -> Vec<String>;
}

pub struct InMemoryConnectionRegistry {
    // user id -> live connection handle
    connections: Arc<RwLock<HashMap<String, ConnectionHandle>>>,
}

impl Default for InMemoryConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(&self, user_id: String, handle: ConnectionHandle) {
        let mut connections = self.connections.write().await;
        if let Some(previous) = connections.insert(user_id.clone(), handle) {
            info!(
                user_id = %user_id,
                "New handshake supersedes existing registration, closing the old socket"
            );
            let _ = previous.sender.send(Outbound::Close {
                code: close_code::NORMAL,
                reason: "superseded by a newer connection".to_string(),
            });
        }
    }

    async fn deregister(&self, user_id: &str, connection_id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(user_id) {
            Some(handle) if handle.connection_id == connection_id => {
                connections.remove(user_id);
                true
            }
            _ => false,
        }
    }

    async fn is_current(&self, user_id: &str, connection_id: Uuid) -> bool {
        let connections = self.connections.read().await;
        connections
            .get(user_id)
            .map(|handle| handle.connection_id == connection_id)
            .unwrap_or(false)
    }

    async fn mark_alive(&self, user_id: &str) {
        let connections = self.connections.read().await;
        if let Some(handle) = connections.get(user_id) {
            handle.alive.store(true, Ordering::SeqCst);
        }
    }

    async fn send_to_user(&self, user_id: &str, message: &str) {
        let connections = self.connections.read().await;
        if let Some(handle) = connections.get(user_id) {
            if handle.sender.send(Outbound::Text(message.to_string())).is_err() {
                // Socket raced into closing; delivery to others must not abort
                warn!(user_id = %user_id, "Dropping message for a connection that is closing");
            }
        }
    }

    async fn send_to_users(&self, user_ids: &[String], message: &str) {
        let connections = self.connections.read().await;
        for user_id in user_ids {
            if let Some(handle) = connections.get(user_id) {
                if handle.sender.send(Outbound::Text(message.to_string())).is_err() {
                    warn!(user_id = %user_id, "Dropping message for a connection that is closing");
                }
            }
        }
    }

    async fn online_user_ids(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        connections.keys().cloned().collect()
    }

    async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    async fn sweep_dead(&self) -> Vec<String> {
        let mut connections = self.connections.write().await;
        let mut dead = Vec::new();

        connections.retain(|user_id, handle| {
            if handle.alive.swap(false, Ordering::SeqCst) {
                // Answered since the previous pass; probe again for the next one
                if handle.sender.send(Outbound::Ping).is_ok() {
                    return true;
                }
                debug!(user_id = %user_id, "Outbound channel gone during liveness probe");
            } else {
                info!(
                    user_id = %user_id,
                    "Ping unanswered since previous sweep, terminating connection"
                );
                let _ = handle.sender.send(Outbound::Close {
                    code: close_code::NORMAL,
                    reason: "heartbeat timeout".to_string(),
                });
            }
            dead.push(user_id.clone());
            false
        });

        dead
    }
}
