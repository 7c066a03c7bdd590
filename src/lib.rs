// Library crate for the opschat signaling server
// This file exposes the public API for integration tests

pub mod auth;
pub mod shared;
pub mod store;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use auth::{AuthenticatedUser, TokenVerifier};
pub use shared::{AppError, AppState};
pub use store::{ChatStore, InMemoryChatStore, MessageProjection, RoomRecord};
pub use websockets::{
    ClientMessage, ConnectionRegistry, HeartbeatConfig, Notifier, RoomBroadcaster, RoomMembership,
    ServerMessage, SignalingReceiveHandler, TypingConfig, TypingTracker,
};
