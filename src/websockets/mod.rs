// Public API
pub use broadcast::{authorize_room_access, Notifier, RoomBroadcaster};
pub use connection_manager::{ConnectionHandle, ConnectionRegistry, InMemoryConnectionRegistry};
pub use handler::{
    handle_connection, run_disconnect_cleanup, websocket_handler, SignalingReceiveHandler,
};
pub use heartbeat::{start_heartbeat_task, HeartbeatConfig};
pub use membership::RoomMembership;
pub use messages::{parse_client_message, ClientMessage, InboundError, ServerMessage};
pub use socket::{Connection, Inbound, MessageHandler, Outbound, SocketError, SocketWrapper};
pub use typing::{start_typing_sweep, TypingConfig, TypingTracker};

// Internal modules
mod broadcast;
mod connection_manager;
mod handler;
mod heartbeat;
mod membership;
mod messages;
mod socket;
mod typing;
