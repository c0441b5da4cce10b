//! Newline-delimited JSON over byte streams

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

use crate::error::Error;
use crate::protocol::JSONRPCMessage;

use super::{decode_frame, Transport};

/// Longest line accepted from the peer
pub const MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

type Reader = FramedRead<Box<dyn AsyncRead + Send + Unpin>, LinesCodec>;
type Writer = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, LinesCodec>;

/// Transport exchanging one JSON frame per line over any async reader/writer pair
pub struct StreamTransport {
    reader: Mutex<Reader>,
    writer: Mutex<Option<Writer>>,
    connected: AtomicBool,
}

impl StreamTransport {
    /// Create a transport over a reader and a writer
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_max_frame_length(reader, writer, MAX_FRAME_LENGTH)
    }

    /// Like [`StreamTransport::new`], rejecting inbound lines longer than `max_length` bytes
    pub fn with_max_frame_length<R, W>(reader: R, writer: W, max_length: usize) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);
        Self {
            reader: Mutex::new(FramedRead::new(reader, LinesCodec::new_with_max_length(max_length))),
            writer: Mutex::new(Some(FramedWrite::new(writer, LinesCodec::new()))),
            connected: AtomicBool::new(true),
        }
    }

    /// Transport over the process's standard input and output
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn connect(&self) -> Result<(), Error> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ChannelClosed("Stream transport cannot reconnect".to_string()))
        }
    }

    async fn disconnect(&self) -> Result<(), Error> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            SinkExt::<String>::close(&mut writer)
                .await
                .map_err(|e| Error::TransportError(format!("Failed to close stream: {}", e)))?;
        }
        Ok(())
    }

    async fn send(&self, message: JSONRPCMessage) -> Result<(), Error> {
        let json = serde_json::to_string(&message)?;
        let mut writer = self.writer.lock().await;
        let writer = writer
            .as_mut()
            .ok_or_else(|| Error::ChannelClosed("Not connected".to_string()))?;
        writer
            .send(json)
            .await
            .map_err(|e| Error::TransportError(format!("Failed to write frame: {}", e)))
    }

    async fn receive(&self) -> Option<Result<JSONRPCMessage, Error>> {
        let mut reader = self.reader.lock().await;
        loop {
            match reader.next().await? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(decode_frame(&line)),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Some(Err(Error::ProtocolViolation(format!(
                        "frame exceeds {} bytes",
                        reader.decoder().max_length()
                    ))));
                }
                Err(e) => {
                    warn!("Failed to read frame: {}", e);
                    self.connected.store(false, Ordering::SeqCst);
                    debug!("Stream transport closed after read error");
                    return Some(Err(Error::TransportError(e.to_string())));
                }
            }
        }
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JSONRPCRequest, RequestId};

    #[tokio::test]
    async fn test_lines_cross_a_duplex_pipe() {
        let (left, right) = tokio::io::duplex(4096);
        let (left_read, left_write) = tokio::io::split(left);
        let (right_read, right_write) = tokio::io::split(right);
        let a = StreamTransport::new(left_read, left_write);
        let b = StreamTransport::new(right_read, right_write);

        a.send(JSONRPCMessage::Request(JSONRPCRequest::new("x-1", "ping", None)))
            .await
            .unwrap();
        let received = b.receive().await.unwrap().unwrap();
        assert_eq!(received.id(), Some(&RequestId::from("x-1")));

        a.disconnect().await.unwrap();
        assert!(b.receive().await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_line_is_a_protocol_violation() {
        use tokio::io::AsyncWriteExt;

        let (local, mut remote) = tokio::io::duplex(4096);
        let (read, write) = tokio::io::split(local);
        let transport = StreamTransport::with_max_frame_length(read, write, 64);

        remote.write_all("x".repeat(200).as_bytes()).await.unwrap();
        match transport.receive().await {
            Some(Err(Error::ProtocolViolation(detail))) => assert!(detail.contains("64")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!transport.is_connected().await);
    }
}
