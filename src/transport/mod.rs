//! Transport layer implementations for MCP
//!
//! A transport is an ordered, reliable, bidirectional channel of JSON-RPC
//! frames. The session engine does not care what carries them.

mod memory;
mod stream;
mod websocket;

pub use memory::MemoryTransport;
pub use stream::{StreamTransport, MAX_FRAME_LENGTH};
pub use websocket::WebSocketTransport;

use async_trait::async_trait;
use crate::error::Error;
use crate::protocol::JSONRPCMessage;

/// Transport interface for sending and receiving MCP messages
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel; a no-op for transports that are born connected
    async fn connect(&self) -> Result<(), Error>;

    /// Close the channel. The peer observes the end of its receive stream.
    async fn disconnect(&self) -> Result<(), Error>;

    /// Send a message to the peer
    async fn send(&self, message: JSONRPCMessage) -> Result<(), Error>;

    /// Receive the next message from the peer.
    ///
    /// `None` once the channel is closed. A frame that fails to parse
    /// yields `Some(Err(Error::ParseError(..)))` and the stream continues.
    async fn receive(&self) -> Option<Result<JSONRPCMessage, Error>>;

    /// Check if the connection is still active
    async fn is_connected(&self) -> bool;
}

/// Parse one text frame
pub(crate) fn decode_frame(text: &str) -> Result<JSONRPCMessage, Error> {
    serde_json::from_str(text).map_err(|e| Error::ParseError(format!("{}: {}", e, text)))
}
