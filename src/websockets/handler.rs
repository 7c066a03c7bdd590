use async_trait::async_trait;
use axum::{
    extract::ws::close_code,
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::shared::{AppError, AppState};

use super::broadcast::authorize_room_access;
use super::connection_manager::ConnectionHandle;
use super::messages::{parse_client_message, ClientMessage, InboundError, ServerMessage};
use super::socket::{Connection, MessageHandler, Outbound, SocketWrapper};

/// Query parameters accepted on the upgrade request. Browser WebSocket clients
/// cannot attach headers before the upgrade completes, so the bearer token
/// rides the query string.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: Option<String>,
}

/// WebSocket endpoint: GET /ws?token=<jwt>
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(app_state): State<AppState>,
) -> Response {
    debug!("WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_connection(Box::new(socket), params.token, app_state))
}

/// Drives one upgraded connection from handshake verification to cleanup.
///
/// Verification happens after the upgrade completes so a failure can be
/// reported with a proper close frame instead of an opaque HTTP rejection.
pub async fn handle_connection(
    mut socket: Box<dyn SocketWrapper>,
    token: Option<String>,
    app_state: AppState,
) {
    let user = match token {
        None => {
            warn!("WebSocket handshake without a token");
            let _ = socket
                .send_close(
                    close_code::POLICY,
                    "missing authentication token".to_string(),
                )
                .await;
            return;
        }
        Some(token) => match app_state.verifier.verify(&token).await {
            Ok(user) => user,
            Err(AppError::Authentication(reason)) => {
                warn!(reason = %reason, "WebSocket handshake with an invalid token");
                let _ = socket
                    .send_close(
                        close_code::POLICY,
                        "invalid authentication token".to_string(),
                    )
                    .await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Unexpected failure verifying handshake token");
                let _ = socket
                    .send_close(close_code::ERROR, "internal error".to_string())
                    .await;
                return;
            }
        },
    };

    let user_id = user.user_id;
    info!(user_id = %user_id, "WebSocket authentication successful");

    // Create the outbound channel (app -> client)
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<Outbound>();
    let handle = ConnectionHandle::new(outbound_sender.clone());
    let connection_id = handle.connection_id;
    let alive = Arc::clone(&handle.alive);

    // Any previous registration for this user is superseded and force-closed here
    app_state.registry.register(user_id.clone(), handle).await;

    let ack = ServerMessage::Connected {
        user_id: user_id.clone(),
    };
    let _ = outbound_sender.send(Outbound::Text(ack.to_json()));

    app_state.notifier.user_online(&user_id).await;

    let message_handler = Arc::new(SignalingReceiveHandler::new(
        app_state.clone(),
        connection_id,
        outbound_sender.clone(),
    ));

    let connection = Connection::new(
        user_id.clone(),
        connection_id,
        socket,
        outbound_receiver,
        alive,
        message_handler,
    );

    // Run the connection until disconnect
    match connection.run().await {
        Ok(()) => {
            info!(user_id = %user_id, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "WebSocket connection error");
        }
    }

    run_disconnect_cleanup(&app_state, &user_id, connection_id).await;
}

/// Cleanup cascade shared by explicit disconnects, transport errors and the
/// supersede path. The registry guard keeps a superseded connection from
/// purging state that now belongs to its successor.
pub async fn run_disconnect_cleanup(app_state: &AppState, user_id: &str, connection_id: Uuid) {
    if !app_state.registry.deregister(user_id, connection_id).await {
        debug!(
            user_id = %user_id,
            "Registration already superseded or swept, skipping cleanup"
        );
        return;
    }

    let rooms_left = app_state.membership.purge_user(user_id).await;
    app_state.typing.clear_user(user_id).await;
    app_state.notifier.user_offline(user_id).await;

    info!(
        user_id = %user_id,
        rooms = rooms_left.len(),
        "Disconnect cleanup complete"
    );
}

/// Dispatches authenticated inbound envelopes to room membership and typing
/// handling. Local replies (acknowledgements and errors) go straight back on
/// this connection's outbound channel.
pub struct SignalingReceiveHandler {
    app_state: AppState,
    connection_id: Uuid,
    reply_sender: mpsc::UnboundedSender<Outbound>,
}

impl SignalingReceiveHandler {
    pub fn new(
        app_state: AppState,
        connection_id: Uuid,
        reply_sender: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            app_state,
            connection_id,
            reply_sender,
        }
    }

    fn send_reply(&self, message: &ServerMessage) {
        if self.reply_sender.send(Outbound::Text(message.to_json())).is_err() {
            debug!("Reply dropped, connection already closing");
        }
    }

    async fn handle_join_room(&self, user_id: &str, room_id: &str) {
        if Uuid::parse_str(room_id).is_err() {
            debug!(
                user_id = %user_id,
                room_id = %room_id,
                "Rejecting join with malformed room id"
            );
            self.send_reply(&ServerMessage::error(format!("invalid room id: {}", room_id)));
            return;
        }

        let room = match self.app_state.store.find_room(room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => {
                debug!(user_id = %user_id, room_id = %room_id, "Join rejected, room not found");
                self.send_reply(&ServerMessage::error("room not found"));
                return;
            }
            Err(e) => {
                warn!(error = %e, room_id = %room_id, "Room lookup failed during join");
                self.send_reply(&ServerMessage::error("internal error"));
                return;
            }
        };

        // The store call suspended us; the registration may have been superseded meanwhile
        if !self
            .app_state
            .registry
            .is_current(user_id, self.connection_id)
            .await
        {
            debug!(user_id = %user_id, "Join response arrived for a stale connection, ignoring");
            return;
        }

        if let Err(e) = authorize_room_access(&room, user_id) {
            debug!(
                user_id = %user_id,
                room_id = %room_id,
                error = %e,
                "Join denied by room access check"
            );
            self.send_reply(&ServerMessage::error("access to room denied"));
            return;
        }

        self.app_state.membership.join(room_id, user_id).await;
        info!(user_id = %user_id, room_id = %room_id, "User joined room broadcasts");
        self.send_reply(&ServerMessage::RoomJoined {
            room_id: room_id.to_string(),
        });
    }

    async fn handle_leave_room(&self, user_id: &str, room_id: &str) {
        // Idempotent: leaving a room never subscribed to is a no-op
        self.app_state.membership.leave(room_id, user_id).await;
        self.app_state.typing.clear(room_id, user_id).await;
        debug!(user_id = %user_id, room_id = %room_id, "User left room broadcasts");
    }

    async fn handle_typing(&self, user_id: &str, room_id: &str, is_typing: bool) {
        // Typing signals from non-members are dropped without a reply
        if !self.app_state.membership.is_member(room_id, user_id).await {
            debug!(
                user_id = %user_id,
                room_id = %room_id,
                "Ignoring typing signal from a non-member"
            );
            return;
        }

        if is_typing {
            self.app_state.typing.arm(room_id, user_id).await;
        } else {
            self.app_state.typing.clear(room_id, user_id).await;
        }

        let signal = ServerMessage::typing(room_id, user_id, is_typing);
        self.app_state
            .broadcaster
            .broadcast_to_room(room_id, &signal, Some(user_id))
            .await;
    }

    async fn handle_ping(&self, user_id: &str) {
        self.app_state.registry.mark_alive(user_id).await;
        self.send_reply(&ServerMessage::Pong);
    }
}

#[async_trait]
impl MessageHandler for SignalingReceiveHandler {
    async fn handle_message(&self, user_id: &str, message: String) {
        debug!(user_id = %user_id, message = %message, "Received envelope");

        match parse_client_message(&message) {
            Ok(ClientMessage::JoinRoom { room_id }) => {
                self.handle_join_room(user_id, &room_id).await
            }
            Ok(ClientMessage::LeaveRoom { room_id }) => {
                self.handle_leave_room(user_id, &room_id).await
            }
            Ok(ClientMessage::Typing { room_id, is_typing }) => {
                self.handle_typing(user_id, &room_id, is_typing).await
            }
            Ok(ClientMessage::Ping) => self.handle_ping(user_id).await,
            Err(InboundError::UnknownType(message_type)) => {
                debug!(
                    user_id = %user_id,
                    message_type = %message_type,
                    "Unrecognized message type"
                );
                self.send_reply(&ServerMessage::error(format!(
                    "unrecognized message type: {}",
                    message_type
                )));
            }
            Err(InboundError::Malformed(e)) => {
                debug!(user_id = %user_id, error = %e, "Malformed envelope");
                self.send_reply(&ServerMessage::error("invalid message format"));
            }
        }
    }
}
