//! In-process transport

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::error::Error;
use crate::protocol::JSONRPCMessage;

use super::{decode_frame, Transport};

/// One end of an in-process duplex channel.
///
/// Frames cross the channel as JSON text, so both ends exercise the same
/// encoding a network transport would.
pub struct MemoryTransport {
    /// Sender for outgoing frames
    sender: RwLock<Option<mpsc::UnboundedSender<String>>>,
    /// Receiver for incoming frames
    receiver: Mutex<mpsc::UnboundedReceiver<String>>,
    /// Whether this end is still open
    connected: AtomicBool,
}

impl MemoryTransport {
    /// Create two connected ends
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, b_rx), Self::new(b_tx, a_rx))
    }

    fn new(sender: mpsc::UnboundedSender<String>, receiver: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            sender: RwLock::new(Some(sender)),
            receiver: Mutex::new(receiver),
            connected: AtomicBool::new(true),
        }
    }

    /// Send a raw text frame, bypassing serialization
    pub async fn send_raw(&self, text: impl Into<String>) -> Result<(), Error> {
        let sender = self.sender.read().await;
        let sender = sender
            .as_ref()
            .ok_or_else(|| Error::ChannelClosed("Not connected".to_string()))?;
        sender
            .send(text.into())
            .map_err(|_| Error::ChannelClosed("Peer went away".to_string()))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<(), Error> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ChannelClosed("Memory transport cannot reconnect".to_string()))
        }
    }

    async fn disconnect(&self) -> Result<(), Error> {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the sender ends the peer's receive stream.
        self.sender.write().await.take();
        Ok(())
    }

    async fn send(&self, message: JSONRPCMessage) -> Result<(), Error> {
        let json = serde_json::to_string(&message)?;
        self.send_raw(json).await
    }

    async fn receive(&self) -> Option<Result<JSONRPCMessage, Error>> {
        let text = self.receiver.lock().await.recv().await?;
        Some(decode_frame(&text))
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
