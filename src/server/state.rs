//! Server state management

use std::collections::HashMap;

use serde_json::Value;

use crate::protocol::{Implementation, LoggingLevel};

/// Client capability flags, as advertised during `initialize`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientCapabilities {
    /// Whether the client answers elicitation requests
    pub elicitation: bool,
    /// Whether the client supports sampling from an LLM
    pub sampling: bool,
    /// Whether the client supports listing roots
    pub roots: bool,
    /// Whether the client supports notifications for changes to the roots list
    pub roots_list_changed: bool,
    /// Experimental capabilities
    pub experimental: HashMap<String, Value>,
}

impl ClientCapabilities {
    /// Parse client capabilities from JSON
    pub fn from_json(json: &Value) -> Self {
        let mut capabilities = ClientCapabilities::default();
        let Some(caps) = json.as_object() else {
            return capabilities;
        };

        capabilities.elicitation = caps.contains_key("elicitation");
        capabilities.sampling = caps.contains_key("sampling");

        if let Some(roots) = caps.get("roots") {
            capabilities.roots = true;
            capabilities.roots_list_changed = roots.get("listChanged").and_then(Value::as_bool).unwrap_or(false);
        }

        if let Some(experimental) = caps.get("experimental").and_then(Value::as_object) {
            for (key, value) in experimental {
                capabilities.experimental.insert(key.clone(), value.clone());
            }
        }

        capabilities
    }
}

/// Per-connection state
#[derive(Debug)]
pub(crate) struct Connection {
    /// Is the connection initialized?
    pub initialized: bool,
    /// Client implementation info (available after initialization)
    pub client_info: Option<Implementation>,
    /// Client protocol version (available after initialization)
    pub protocol_version: Option<String>,
    /// Client capabilities (available after initialization)
    pub capabilities: ClientCapabilities,
    /// Log lines below this level are not forwarded
    pub log_level: LoggingLevel,
}

impl Connection {
    /// Create a new connection
    pub fn new() -> Self {
        Self {
            initialized: false,
            client_info: None,
            protocol_version: None,
            capabilities: ClientCapabilities::default(),
            log_level: LoggingLevel::Debug,
        }
    }

    /// Set the connection as initialized
    pub fn set_initialized(
        &mut self,
        client_info: Implementation,
        protocol_version: String,
        capabilities: ClientCapabilities,
    ) {
        self.initialized = true;
        self.client_info = Some(client_info);
        self.protocol_version = Some(protocol_version);
        self.capabilities = capabilities;
    }

    /// Whether a log line at `level` passes the client's filter
    pub fn forwards(&self, level: LoggingLevel) -> bool {
        level.is_at_least_as_severe_as(&self.log_level)
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_capabilities() {
        let caps = ClientCapabilities::from_json(&json!({
            "sampling": {},
            "roots": {"listChanged": true}
        }));
        assert!(caps.sampling);
        assert!(!caps.elicitation);
        assert!(caps.roots && caps.roots_list_changed);

        assert_eq!(ClientCapabilities::from_json(&Value::Null), ClientCapabilities::default());
    }

    #[test]
    fn test_log_filter() {
        let mut connection = Connection::new();
        assert!(connection.forwards(LoggingLevel::Debug));

        connection.log_level = LoggingLevel::Warning;
        assert!(!connection.forwards(LoggingLevel::Info));
        assert!(connection.forwards(LoggingLevel::Warning));
        assert!(connection.forwards(LoggingLevel::Critical));
    }
}
