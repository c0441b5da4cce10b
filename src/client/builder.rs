//! Builder for configuring and creating MCP clients

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::Error;
use crate::protocol::Root;
use crate::session::SessionEvent;
use crate::transport::{Transport, WebSocketTransport};

use super::callbacks::{
    CallbackRegistry, ElicitationHandler, LogHandler, ProgressHandler, RootsHandler, SamplingHandler, StaticRoots,
};
use super::{Client, ClientOptions};

/// Builder for creating and configuring MCP clients
#[derive(Default)]
pub struct ClientBuilder {
    /// Client options
    options: ClientOptions,
    /// WebSocket URL (for WebSocketTransport)
    websocket_url: Option<String>,
    /// Custom transport implementation
    transport: Option<Box<dyn Transport>>,
    /// Handlers for server callbacks
    registry: CallbackRegistry,
}

impl ClientBuilder {
    /// Create a new client builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client implementation name and version
    pub fn with_implementation(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.options.implementation.name = name.into();
        self.options.implementation.version = version.into();
        self
    }

    /// Set the default timeout for requests in milliseconds
    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.options.default_timeout_ms = timeout_ms;
        self
    }

    /// Set the WebSocket URL to connect to
    pub fn with_websocket_url(mut self, url: impl Into<String>) -> Self {
        self.websocket_url = Some(url.into());
        self
    }

    /// Set a custom transport implementation
    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Answer `elicitation/create`
    pub fn with_elicitation_handler(mut self, handler: impl ElicitationHandler + 'static) -> Self {
        self.registry.set_elicitation(handler);
        self
    }

    /// Answer `sampling/createMessage`
    pub fn with_sampling_handler(mut self, handler: impl SamplingHandler + 'static) -> Self {
        self.registry.set_sampling(handler);
        self
    }

    /// Answer `roots/list` with a fixed list
    pub fn with_roots(self, roots: Vec<Root>) -> Self {
        self.with_roots_handler(StaticRoots::new(roots))
    }

    /// Answer `roots/list`
    pub fn with_roots_handler(mut self, handler: impl RootsHandler + 'static) -> Self {
        self.registry.set_roots(handler);
        self
    }

    /// Advertise roots list changed notifications
    pub fn with_roots_list_changed(mut self, enable: bool) -> Self {
        self.registry.set_roots_list_changed(enable);
        self
    }

    /// Receive `notifications/message` from the server
    pub fn with_log_handler(mut self, handler: impl LogHandler + 'static) -> Self {
        self.registry.set_log(handler);
        self
    }

    /// Receive progress of our own requests that have no per-call observer
    pub fn with_progress_handler(mut self, handler: impl ProgressHandler + 'static) -> Self {
        self.registry.set_progress(handler);
        self
    }

    /// Connect the transport and run the handshake
    pub async fn connect(self) -> Result<(Client, mpsc::Receiver<SessionEvent>), Error> {
        let transport: Arc<dyn Transport> = if let Some(transport) = self.transport {
            Arc::from(transport)
        } else if let Some(url) = self.websocket_url {
            Arc::new(WebSocketTransport::new(&url)?)
        } else {
            return Err(Error::ConfigError("No transport or WebSocket URL specified".to_string()));
        };

        Client::connect(transport, self.registry, self.options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_requires_transport() {
        let result = ClientBuilder::new().with_implementation("detached", "0.0.1").connect().await;
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_invalid_websocket_url() {
        let result = ClientBuilder::new().with_websocket_url("http://localhost:1").connect().await;
        assert!(matches!(result, Err(Error::UrlError(_)) | Err(Error::ConfigError(_))));
    }
}
