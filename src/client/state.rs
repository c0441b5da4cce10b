//! Client state management

use crate::protocol::Implementation;

use super::ServerCapabilities;

/// Current client connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to server
    Disconnected,
    /// Initializing protocol
    Initializing,
    /// Fully initialized and ready
    Initialized,
}

/// What the server told us during the handshake
#[derive(Debug, Clone)]
pub struct ServerInfo {
    /// Server implementation
    pub implementation: Implementation,
    /// Protocol version the server speaks
    pub protocol_version: String,
    /// Features the server offers
    pub capabilities: ServerCapabilities,
    /// Usage hints for the client
    pub instructions: Option<String>,
}

/// Client state
pub(crate) struct ClientState {
    /// Current connection state
    connection_state: ConnectionState,
    /// Server details, available after initialization
    server: Option<ServerInfo>,
}

impl ClientState {
    /// Create a new client state
    pub fn new() -> Self {
        Self {
            connection_state: ConnectionState::Disconnected,
            server: None,
        }
    }

    /// Get the current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    /// Set the client state to initializing
    pub fn set_initializing(&mut self) {
        self.connection_state = ConnectionState::Initializing;
    }

    /// Record the handshake result
    pub fn set_initialized(&mut self, server: ServerInfo) {
        self.connection_state = ConnectionState::Initialized;
        self.server = Some(server);
    }

    /// Set the client state to disconnected
    pub fn set_disconnected(&mut self) {
        self.connection_state = ConnectionState::Disconnected;
    }

    /// Server details, if initialized
    pub fn server(&self) -> Option<&ServerInfo> {
        self.server.as_ref()
    }

    /// Check if the client is initialized
    pub fn is_initialized(&self) -> bool {
        self.connection_state == ConnectionState::Initialized
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut state = ClientState::new();
        assert_eq!(state.connection_state(), ConnectionState::Disconnected);
        assert!(state.server().is_none());

        state.set_initializing();
        assert!(!state.is_initialized());

        state.set_initialized(ServerInfo {
            implementation: Implementation::new("test", "1.0"),
            protocol_version: "2025-06-18".to_string(),
            capabilities: ServerCapabilities::default(),
            instructions: None,
        });
        assert!(state.is_initialized());
        assert_eq!(state.server().unwrap().implementation.name, "test");

        state.set_disconnected();
        assert_eq!(state.connection_state(), ConnectionState::Disconnected);
    }
}
