//! WebSocket transport implementation for MCP

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    accept_async,
    connect_async,
    tungstenite::protocol::Message as WsMessage,
    WebSocketStream,
};
use url::Url;
use log::{debug, error, info, warn};

use crate::error::Error;
use crate::protocol::JSONRPCMessage;

use super::{decode_frame, Transport};

/// WebSocket transport for MCP
pub struct WebSocketTransport {
    /// WebSocket URL, absent for accepted connections
    url: Option<Url>,
    /// Whether the connection is active
    connected: Arc<AtomicBool>,
    /// Sender for outgoing messages
    sender: RwLock<Option<mpsc::Sender<WsMessage>>>,
    /// Receiver for incoming messages
    receiver: Mutex<Option<mpsc::Receiver<Result<JSONRPCMessage, Error>>>>,
}

impl WebSocketTransport {
    /// Create a client transport for `url`; nothing is dialled until `connect`
    pub fn new(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url)?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(Error::UrlError(format!("Not a WebSocket URL: {}", url)));
        }

        Ok(Self {
            url: Some(url),
            connected: Arc::new(AtomicBool::new(false)),
            sender: RwLock::new(None),
            receiver: Mutex::new(None),
        })
    }

    /// Complete the server side handshake on an accepted TCP connection
    pub async fn accept(stream: TcpStream) -> Result<Self, Error> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| Error::TransportError(format!("WebSocket handshake failed: {}", e)))?;
        info!("WebSocket connection accepted");

        let transport = Self {
            url: None,
            connected: Arc::new(AtomicBool::new(false)),
            sender: RwLock::new(None),
            receiver: Mutex::new(None),
        };
        transport.attach(ws_stream).await;
        Ok(transport)
    }

    async fn attach<S>(&self, ws_stream: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<WsMessage>(100);
        let (incoming_tx, incoming_rx) = mpsc::channel::<Result<JSONRPCMessage, Error>>(100);

        *self.sender.write().await = Some(outgoing_tx);
        *self.receiver.lock().await = Some(incoming_rx);
        self.connected.store(true, Ordering::SeqCst);

        let connected = self.connected.clone();
        tokio::spawn(async move {
            handle_websocket(ws_stream, outgoing_rx, incoming_tx, connected).await;
        });
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<(), Error> {
        // Already connected?
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        let url = self
            .url
            .as_ref()
            .ok_or_else(|| Error::ChannelClosed("Accepted connection cannot reconnect".to_string()))?;

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::TransportError(format!("WebSocket connection failed: {}", e)))?;

        info!("WebSocket connected to {}", url);
        self.attach(ws_stream).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Error> {
        // Not connected?
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        // Dropping the sender after the close frame stops the writer task.
        if let Some(sender) = self.sender.write().await.take() {
            let _ = sender.send(WsMessage::Close(None)).await;
        }
        Ok(())
    }

    async fn send(&self, message: JSONRPCMessage) -> Result<(), Error> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::ChannelClosed("Not connected".to_string()));
        }

        let json = serde_json::to_string(&message)?;

        let sender = self.sender.read().await;
        let sender = sender
            .as_ref()
            .ok_or_else(|| Error::ChannelClosed("Connection not initialized".to_string()))?;

        sender
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|_| Error::ChannelClosed("Failed to send message".to_string()))
    }

    async fn receive(&self) -> Option<Result<JSONRPCMessage, Error>> {
        let mut receiver = self.receiver.lock().await;
        receiver.as_mut()?.recv().await
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Pump frames between the socket and the transport's channels
async fn handle_websocket<S>(
    ws_stream: WebSocketStream<S>,
    outgoing_rx: mpsc::Receiver<WsMessage>,
    incoming_tx: mpsc::Sender<Result<JSONRPCMessage, Error>>,
    connected: Arc<AtomicBool>,
)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let mut outgoing_stream = ReceiverStream::new(outgoing_rx);

    let outgoing_task = tokio::spawn(async move {
        while let Some(msg) = outgoing_stream.next().await {
            if let Err(e) = ws_sender.send(msg).await {
                error!("WebSocket send error: {}", e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let incoming_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            let frame = match msg {
                Ok(WsMessage::Text(text)) => decode_frame(&text),
                Ok(WsMessage::Close(_)) => {
                    debug!("WebSocket connection closed by peer");
                    break;
                }
                Ok(WsMessage::Binary(_)) | Ok(WsMessage::Frame(_)) => {
                    warn!("Ignoring non-text WebSocket message");
                    continue;
                }
                // Handled by tungstenite
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
                Err(e) => {
                    error!("WebSocket receive error: {}", e);
                    let _ = incoming_tx
                        .send(Err(Error::TransportError(format!("WebSocket error: {}", e))))
                        .await;
                    break;
                }
            };
            if incoming_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = outgoing_task => debug!("Outgoing WebSocket task completed"),
        _ = incoming_task => debug!("Incoming WebSocket task completed"),
    }

    connected.store(false, Ordering::SeqCst);
}
