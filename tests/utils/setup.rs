//! Test setup infrastructure - assembles the signaling state graph with an
//! in-memory store and simulated connections
#![allow(dead_code)] // Test utilities may not all be used in every test

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use opschat_signaling::auth::{AuthClaims, JwtTokenVerifier};
use opschat_signaling::shared::AppState;
use opschat_signaling::store::{ChatStore, InMemoryChatStore, RoomRecord};
use opschat_signaling::websockets::{
    run_disconnect_cleanup, ConnectionHandle, MessageHandler, Outbound, ServerMessage,
    SignalingReceiveHandler, TypingConfig,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// Room ids shaped like persisted document identifiers
pub const ROOM_A: &str = "aaaaaaaa-1111-4111-8111-aaaaaaaaaaaa";
pub const ROOM_B: &str = "bbbbbbbb-2222-4222-8222-bbbbbbbbbbbb";

pub const TEST_SECRET: &str = "workflow-test-secret";

/// Issues a token the test setup's verifier accepts
pub fn issue_token(user_id: &str) -> String {
    let now = Utc::now();
    let claims = AuthClaims {
        sub: user_id.to_string(),
        exp: (now + chrono::Duration::hours(1)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_ref()),
    )
    .unwrap()
}

pub struct TestSetup {
    pub state: AppState,
    pub store: Arc<InMemoryChatStore>,
    pub typing_config: TypingConfig,
}

/// A simulated connection: envelopes go through the real dispatch handler and
/// everything the server sends lands in the outbound receiver
pub struct TestClient {
    pub user_id: String,
    pub connection_id: Uuid,
    handler: SignalingReceiveHandler,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl TestClient {
    pub async fn send(&self, envelope: &str) {
        self.handler
            .handle_message(&self.user_id, envelope.to_string())
            .await;
    }

    pub async fn join(&self, room_id: &str) {
        self.send(&format!(
            r#"{{"type":"join_room","room_id":"{}"}}"#,
            room_id
        ))
        .await;
    }

    pub async fn leave(&self, room_id: &str) {
        self.send(&format!(
            r#"{{"type":"leave_room","room_id":"{}"}}"#,
            room_id
        ))
        .await;
    }

    pub async fn typing(&self, room_id: &str, is_typing: bool) {
        self.send(&format!(
            r#"{{"type":"typing","room_id":"{}","is_typing":{}}}"#,
            room_id, is_typing
        ))
        .await;
    }

    /// Drains buffered server envelopes, dropping protocol-level frames
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            if let Outbound::Text(json) = frame {
                messages.push(serde_json::from_str(&json).unwrap());
            }
        }
        messages
    }

    /// Drains every buffered outbound frame, including pings and closes
    pub fn drain_frames(&mut self) -> Vec<Outbound> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

impl TestSetup {
    /// Registers a simulated connection, replaying the handshake side effects
    /// (ack plus presence) of a real upgrade
    pub async fn connect(&self, user_id: &str) -> TestClient {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(sender.clone());
        let connection_id = handle.connection_id;
        self.state
            .registry
            .register(user_id.to_string(), handle)
            .await;

        let ack = ServerMessage::Connected {
            user_id: user_id.to_string(),
        };
        let _ = sender.send(Outbound::Text(ack.to_json()));
        self.state.notifier.user_online(user_id).await;

        TestClient {
            user_id: user_id.to_string(),
            connection_id,
            handler: SignalingReceiveHandler::new(self.state.clone(), connection_id, sender),
            outbound: receiver,
        }
    }

    /// Runs the same cleanup cascade a closed socket triggers
    pub async fn disconnect(&self, client: &TestClient) {
        run_disconnect_cleanup(&self.state, &client.user_id, client.connection_id).await;
    }
}

pub struct TestSetupBuilder {
    rooms: Vec<RoomRecord>,
    typing_window: Duration,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            rooms: vec![],
            typing_window: Duration::from_secs(3),
        }
    }

    pub fn with_room(mut self, room_id: &str, participants: Vec<&str>) -> Self {
        self.rooms.push(RoomRecord {
            id: room_id.to_string(),
            name: format!("room-{}", self.rooms.len() + 1),
            participants: participants.into_iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        });
        self
    }

    pub fn with_typing_window(mut self, window: Duration) -> Self {
        self.typing_window = window;
        self
    }

    pub fn build(self) -> TestSetup {
        let store = Arc::new(InMemoryChatStore::with_rooms(self.rooms));
        let verifier = Arc::new(JwtTokenVerifier::with_secret(TEST_SECRET));
        let typing_config = TypingConfig {
            expiry_window: self.typing_window,
            ..TypingConfig::default()
        };

        let state = AppState::new(
            Arc::clone(&store) as Arc<dyn ChatStore + Send + Sync>,
            verifier,
            &typing_config,
        );

        TestSetup {
            state,
            store,
            typing_config,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
