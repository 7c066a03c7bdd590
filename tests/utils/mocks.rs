//! Socket stand-in for driving the real connection loop without a network
#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use opschat_signaling::websockets::{Inbound, SocketError, SocketWrapper};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Every frame the server pushed down the fake socket
#[derive(Debug, Clone, PartialEq)]
pub enum SentFrame {
    Text(String),
    Ping,
    Close { code: u16, reason: String },
}

/// SocketWrapper backed by a channel: the test feeds inbound frames through the
/// sender and the connection loop ends when the sender is dropped
pub struct ChannelSocket {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    sent: Arc<Mutex<Vec<SentFrame>>>,
}

impl ChannelSocket {
    pub fn new() -> (
        Self,
        mpsc::UnboundedSender<Inbound>,
        Arc<Mutex<Vec<SentFrame>>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inbound: rx,
                sent: Arc::clone(&sent),
            },
            tx,
            sent,
        )
    }
}

#[async_trait]
impl SocketWrapper for ChannelSocket {
    async fn send_text(&mut self, message: String) -> Result<(), SocketError> {
        self.sent.lock().unwrap().push(SentFrame::Text(message));
        Ok(())
    }

    async fn send_ping(&mut self) -> Result<(), SocketError> {
        self.sent.lock().unwrap().push(SentFrame::Ping);
        Ok(())
    }

    async fn send_close(&mut self, code: u16, reason: String) -> Result<(), SocketError> {
        self.sent
            .lock()
            .unwrap()
            .push(SentFrame::Close { code, reason });
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<Inbound>, SocketError> {
        Ok(self.inbound.recv().await)
    }
}
