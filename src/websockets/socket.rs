use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Frames the server pushes to a connection through its outbound channel
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// JSON envelope destined for the client
    Text(String),
    /// Liveness probe
    Ping,
    /// Terminate the connection with a close frame
    Close { code: u16, reason: String },
}

/// Inbound frames the connection loop acts on
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Text(String),
    Pong,
}

#[derive(Error, Debug)]
pub enum SocketError {
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Simple WebSocket abstraction - all we care about is send/receive/close
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text frame to the client
    async fn send_text(&mut self, message: String) -> Result<(), SocketError>;

    /// Send a protocol-level ping frame
    async fn send_ping(&mut self) -> Result<(), SocketError>;

    /// Send a close frame with the given code and reason
    async fn send_close(&mut self, code: u16, reason: String) -> Result<(), SocketError>;

    /// Receive the next actionable frame (None if the connection closed)
    async fn receive(&mut self) -> Result<Option<Inbound>, SocketError>;
}

/// Handler for incoming WebSocket envelopes from an authenticated connection
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, user_id: &str, message: String);
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_text(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), SocketError> {
        self.send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn send_close(&mut self, code: u16, reason: String) -> Result<(), SocketError> {
        self.send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive(&mut self) -> Result<Option<Inbound>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(Inbound::Text(text))),
                Some(Ok(Message::Pong(_))) => return Ok(Some(Inbound::Pong)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue, // Binary and ping frames are not part of the protocol
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
                None => return Ok(None), // Connection closed
            }
        }
    }
}

/// Connection represents a managed WebSocket connection after a successful handshake.
/// The outbound receiver is fed by the connection registry; inbound envelopes are
/// dispatched to the message handler. A protocol pong resets the liveness flag the
/// heartbeat monitor clears before each probe.
pub struct Connection {
    pub user_id: String,
    pub connection_id: Uuid,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<Outbound>,
    alive: Arc<AtomicBool>,
    message_handler: Arc<dyn MessageHandler>,
}

impl Connection {
    pub fn new(
        user_id: String,
        connection_id: Uuid,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<Outbound>,
        alive: Arc<AtomicBool>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            user_id,
            connection_id,
            socket,
            outbound_receiver,
            alive,
            message_handler,
        }
    }

    /// Run the connection - pumps both directions until disconnect or forced close
    pub async fn run(mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Handle outbound frames (from our app to client)
                frame = self.outbound_receiver.recv() => {
                    match frame {
                        Some(Outbound::Text(message)) => {
                            self.socket.send_text(message).await?
                        }
                        Some(Outbound::Ping) => {
                            self.socket.send_ping().await?
                        }
                        Some(Outbound::Close { code, reason }) => {
                            // Forced close (superseded registration or heartbeat timeout)
                            let _ = self.socket.send_close(code, reason).await;
                            return Ok(());
                        }
                        None => break, // Channel closed, disconnect
                    }
                }

                // Handle inbound frames (from client to our app)
                frame = self.socket.receive() => {
                    match frame {
                        Ok(Some(Inbound::Text(message))) => {
                            self.message_handler
                                .handle_message(&self.user_id, message)
                                .await;
                        }
                        Ok(Some(Inbound::Pong)) => {
                            self.alive.store(true, Ordering::SeqCst);
                        }
                        Ok(None) => break, // Client disconnected
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        // Clean disconnect
        let _ = self
            .socket
            .send_close(close_code::NORMAL, String::new())
            .await;
        Ok(())
    }
}
