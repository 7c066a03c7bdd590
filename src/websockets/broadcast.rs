use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::connection_manager::ConnectionRegistry;
use super::membership::RoomMembership;
use super::messages::ServerMessage;
use crate::shared::AppError;
use crate::store::{ChatStore, RoomRecord};

/// Single authorization gate for room-scoped delivery: applied when a user
/// joins a room and again for every server-triggered broadcast into it, so a
/// participant removed after joining stops receiving room traffic.
pub fn authorize_room_access(room: &RoomRecord, user_id: &str) -> Result<(), AppError> {
    if room.has_participant(user_id) {
        Ok(())
    } else {
        Err(AppError::Authorization(format!(
            "user is not a participant of room {}",
            room.id
        )))
    }
}

/// Fan-out primitive delivering an envelope to the connections currently
/// subscribed to a room
pub struct RoomBroadcaster {
    registry: Arc<dyn ConnectionRegistry>,
    membership: Arc<RoomMembership>,
}

impl RoomBroadcaster {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, membership: Arc<RoomMembership>) -> Self {
        Self {
            registry,
            membership,
        }
    }

    /// Delivers to every registered connection among the room's members except
    /// the excluded user. Per-recipient failures are logged by the registry and
    /// never abort delivery to the rest.
    pub async fn broadcast_to_room(
        &self,
        room_id: &str,
        message: &ServerMessage,
        exclude_user: Option<&str>,
    ) {
        let recipients: Vec<String> = self
            .membership
            .members(room_id)
            .await
            .into_iter()
            .filter(|member| exclude_user != Some(member.as_str()))
            .collect();

        if recipients.is_empty() {
            debug!(room_id = %room_id, "No subscribed connections, skipping broadcast");
            return;
        }

        self.registry
            .send_to_users(&recipients, &message.to_json())
            .await;
        debug!(
            room_id = %room_id,
            recipients = recipients.len(),
            "Broadcast delivered to room"
        );
    }
}

/// Kinds of persisted-message change the REST layer reports
enum MessageEvent {
    Created,
    Updated,
}

/// Public notification surface for server-originated events. The back-office
/// REST layer calls these after persisting a change; presence notifications
/// ride global connect/disconnect and ignore room subscriptions entirely.
pub struct Notifier {
    store: Arc<dyn ChatStore + Send + Sync>,
    registry: Arc<dyn ConnectionRegistry>,
    membership: Arc<RoomMembership>,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn ChatStore + Send + Sync>,
        registry: Arc<dyn ConnectionRegistry>,
        membership: Arc<RoomMembership>,
    ) -> Self {
        Self {
            store,
            registry,
            membership,
        }
    }

    #[instrument(skip(self))]
    pub async fn notify_new_message(
        &self,
        room_id: &str,
        message_id: &str,
    ) -> Result<(), AppError> {
        self.notify_message_event(room_id, message_id, MessageEvent::Created)
            .await
    }

    #[instrument(skip(self))]
    pub async fn notify_message_updated(
        &self,
        room_id: &str,
        message_id: &str,
    ) -> Result<(), AppError> {
        self.notify_message_event(room_id, message_id, MessageEvent::Updated)
            .await
    }

    /// Deleted messages carry only the identifier so removed content is never
    /// re-sent to clients
    #[instrument(skip(self))]
    pub async fn notify_message_deleted(
        &self,
        room_id: &str,
        message_id: &str,
    ) -> Result<(), AppError> {
        let Some(room) = self.store.find_room(room_id).await? else {
            warn!(room_id = %room_id, "Room vanished before delete notification, skipping");
            return Ok(());
        };

        let envelope = ServerMessage::MessageDeleted {
            room_id: room_id.to_string(),
            message_id: message_id.to_string(),
        };
        self.broadcast_scoped(&room, &envelope).await;
        Ok(())
    }

    async fn notify_message_event(
        &self,
        room_id: &str,
        message_id: &str,
        kind: MessageEvent,
    ) -> Result<(), AppError> {
        let Some(room) = self.store.find_room(room_id).await? else {
            warn!(room_id = %room_id, "Room vanished before message notification, skipping");
            return Ok(());
        };

        let Some(message) = self.store.fetch_enriched_message(message_id).await? else {
            warn!(message_id = %message_id, "Message vanished before notification, skipping");
            return Ok(());
        };

        if message.room_id != room_id {
            warn!(
                message_id = %message_id,
                room_id = %room_id,
                "Message does not belong to the notified room, skipping"
            );
            return Ok(());
        }

        let envelope = match kind {
            MessageEvent::Created => ServerMessage::NewMessage {
                room_id: room_id.to_string(),
                message,
            },
            MessageEvent::Updated => ServerMessage::MessageUpdated {
                room_id: room_id.to_string(),
                message,
            },
        };
        self.broadcast_scoped(&room, &envelope).await;
        Ok(())
    }

    /// Room-scoped delivery re-checking authorization per recipient; the
    /// subscription table alone is not trusted because persisted participation
    /// may have changed since the user joined
    async fn broadcast_scoped(&self, room: &RoomRecord, message: &ServerMessage) {
        let recipients: Vec<String> = self
            .membership
            .members(&room.id)
            .await
            .into_iter()
            .filter(|member| authorize_room_access(room, member).is_ok())
            .collect();

        if recipients.is_empty() {
            debug!(room_id = %room.id, "No authorized subscribers, skipping notification");
            return;
        }

        self.registry
            .send_to_users(&recipients, &message.to_json())
            .await;
        debug!(
            room_id = %room.id,
            recipients = recipients.len(),
            "Notification delivered to room"
        );
    }

    /// Presence is a side effect of global connect/disconnect, independent of
    /// room subscriptions
    pub async fn user_online(&self, user_id: &str) {
        self.broadcast_presence(user_id, true).await;
    }

    pub async fn user_offline(&self, user_id: &str) {
        self.broadcast_presence(user_id, false).await;
    }

    async fn broadcast_presence(&self, user_id: &str, online: bool) {
        let targets: Vec<String> = self
            .registry
            .online_user_ids()
            .await
            .into_iter()
            .filter(|online_user| online_user != user_id)
            .collect();

        if targets.is_empty() {
            return;
        }

        let envelope = if online {
            ServerMessage::UserOnline {
                user_id: user_id.to_string(),
            }
        } else {
            ServerMessage::UserOffline {
                user_id: user_id.to_string(),
            }
        };

        self.registry
            .send_to_users(&targets, &envelope.to_json())
            .await;
        debug!(
            user_id = %user_id,
            online = online,
            targets = targets.len(),
            "Presence broadcast delivered"
        );
    }
}
