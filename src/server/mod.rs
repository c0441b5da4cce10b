//! MCP server implementation
//!
//! A [`Server`] holds the options and the [`ServerService`] shared by every
//! connection; [`Server::serve`] opens one [`ServerSession`] per transport.
//! Tool code talks back to the client through an [`InvocationContext`].

mod builder;
mod context;
mod handler;
mod registry;
mod service;
mod state;

pub use builder::ServerBuilder;
pub use context::InvocationContext;
pub use registry::Registry;
pub use service::{ServerService, ServiceRequest, ServiceResponse};
pub use state::ClientCapabilities;

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};

use crate::error::{Error, Result};
use crate::protocol::{Implementation, LoggingLevel};
use crate::session::{Session, SessionEvent, SessionOptions};
use crate::transport::Transport;

use self::handler::ServerMessageHandler;
use self::state::Connection;

/// Server capability flags and settings
#[derive(Debug, Clone)]
pub struct ServerCapabilities {
    /// Whether the server supports sending log messages
    pub logging: bool,
    /// Whether the server supports prompts
    pub prompts: bool,
    /// Whether the server supports prompts list changed notifications
    pub prompts_list_changed: bool,
    /// Whether the server supports resources
    pub resources: bool,
    /// Whether the server supports resource list changed notifications
    pub resources_list_changed: bool,
    /// Whether the server supports tools
    pub tools: bool,
    /// Whether the server supports tool list changed notifications
    pub tools_list_changed: bool,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            logging: true,
            prompts: false,
            prompts_list_changed: false,
            resources: false,
            resources_list_changed: false,
            tools: false,
            tools_list_changed: false,
        }
    }
}

impl ServerCapabilities {
    /// The `capabilities` member of the `initialize` result. Disabled features are omitted.
    pub fn to_json(&self) -> Value {
        let mut capabilities = serde_json::Map::new();
        if self.logging {
            capabilities.insert("logging".to_string(), json!({}));
        }
        if self.prompts {
            capabilities.insert("prompts".to_string(), json!({ "listChanged": self.prompts_list_changed }));
        }
        if self.resources {
            capabilities.insert("resources".to_string(), json!({ "listChanged": self.resources_list_changed }));
        }
        if self.tools {
            capabilities.insert("tools".to_string(), json!({ "listChanged": self.tools_list_changed }));
        }
        Value::Object(capabilities)
    }
}

/// MCP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Server implementation info
    pub implementation: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Server instructions
    pub instructions: Option<String>,
    /// Default timeout for nested requests in milliseconds (0 = no timeout)
    pub default_timeout_ms: u64,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            implementation: Implementation::new("mcpx-server", env!("CARGO_PKG_VERSION")),
            capabilities: ServerCapabilities::default(),
            instructions: None,
            default_timeout_ms: 30000, // 30 seconds
        }
    }
}

/// MCP server
#[derive(Clone)]
pub struct Server {
    /// Server options
    options: ServerOptions,
    /// Service implementation
    service: Arc<dyn ServerService>,
}

impl Server {
    /// Create a new server with the given options and service
    pub fn new(options: ServerOptions, service: impl ServerService + 'static) -> Self {
        Self {
            options,
            service: Arc::new(service),
        }
    }

    /// Server options
    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Serve one client over `transport`
    pub async fn serve(&self, transport: Arc<dyn Transport>) -> Result<(ServerSession, mpsc::Receiver<SessionEvent>)> {
        let connection = Arc::new(RwLock::new(Connection::new()));
        let handler = Arc::new(ServerMessageHandler::new(
            self.options.clone(),
            self.service.clone(),
            connection.clone(),
        ));
        let session_options = SessionOptions::builder()
            .default_timeout_ms(self.options.default_timeout_ms)
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let (session, events) = Session::open(transport, handler, session_options).await?;
        Ok((ServerSession { session, connection }, events))
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").field("options", &self.options).finish()
    }
}

/// One client connection served by a [`Server`]
#[derive(Clone)]
pub struct ServerSession {
    session: Session,
    connection: Arc<RwLock<Connection>>,
}

impl ServerSession {
    /// The underlying session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the client completed the handshake
    pub async fn is_initialized(&self) -> bool {
        self.connection.read().await.initialized
    }

    /// The client's implementation info, after the handshake
    pub async fn client_info(&self) -> Option<Implementation> {
        self.connection.read().await.client_info.clone()
    }

    /// The client's advertised capabilities
    pub async fn client_capabilities(&self) -> ClientCapabilities {
        self.connection.read().await.capabilities.clone()
    }

    /// Minimum level of log lines forwarded to the client
    pub async fn log_level(&self) -> LoggingLevel {
        self.connection.read().await.log_level
    }

    /// Resolves when the connection ends
    pub async fn closed(&self) {
        self.session.closed().await
    }

    /// Close the connection
    pub async fn close(&self) {
        self.session.close().await
    }
}

impl fmt::Debug for ServerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSession").field("session", &self.session).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_json_omits_disabled() {
        let caps = ServerCapabilities {
            tools: true,
            ..ServerCapabilities::default()
        };
        assert_eq!(
            caps.to_json(),
            json!({"logging": {}, "tools": {"listChanged": false}})
        );
    }
}
