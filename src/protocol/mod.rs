//! Protocol types and definitions for the Model Context Protocol (MCP)
//!
//! This module contains the wire types exchanged by the duplex engine,
//! based on the specification version 2025-06-18.

pub mod json_rpc;
pub mod messages;
pub mod elicitation;
pub mod sampling;
pub mod roots;
pub mod logging;
pub mod progress;
pub mod tools;
pub mod resources;
pub mod prompts;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Latest protocol version supported by this library
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Describes the name and version of an MCP implementation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Implementation {
    /// Name of the implementation
    pub name: String,
    /// Version of the implementation
    pub version: String,
}

impl Implementation {
    /// Create a new Implementation
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// The sender or recipient of messages and data in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A user or human participant
    User,
    /// An AI assistant
    Assistant,
}

/// A progress token, used to associate progress notifications with the original request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ProgressToken {
    /// String token
    String(String),
    /// Integer token
    Integer(i64),
}

/// A unique request ID for JSON-RPC messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    /// String ID
    String(String),
    /// Integer ID
    Integer(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<i64> for RequestId {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

// Progress is scoped by using the request id itself as the token.
impl From<RequestId> for ProgressToken {
    fn from(id: RequestId) -> Self {
        match id {
            RequestId::String(s) => Self::String(s),
            RequestId::Integer(i) => Self::Integer(i),
        }
    }
}

impl From<ProgressToken> for RequestId {
    fn from(token: ProgressToken) -> Self {
        match token {
            ProgressToken::String(s) => Self::String(s),
            ProgressToken::Integer(i) => Self::Integer(i),
        }
    }
}

// Re-export common types for convenience
pub use self::json_rpc::{JSONRPCMessage, JSONRPCRequest, JSONRPCResponse, JSONRPCError, JSONRPCNotification};
pub use self::elicitation::{ElicitAction, ElicitRequestParams, ElicitResult};
pub use self::sampling::{Content, CreateMessageParams, CreateMessageResult, SamplingMessage};
pub use self::roots::Root;
pub use self::logging::{LoggingLevel, LoggingMessageParams};
pub use self::progress::ProgressParams;
pub use self::tools::{Tool, CallToolResult};
pub use self::resources::{Resource, ResourceTemplate, ResourceContents};
pub use self::prompts::{Prompt, PromptArgument, PromptMessage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_serde_and_display() {
        let id: RequestId = serde_json::from_str("\"ab12-7\"").unwrap();
        assert_eq!(id, RequestId::from("ab12-7"));
        assert_eq!(id.to_string(), "ab12-7");

        let id: RequestId = serde_json::from_str("42").unwrap();
        assert_eq!(id, RequestId::Integer(42));
        assert_eq!(ProgressToken::from(id.clone()), ProgressToken::Integer(42));
        assert_eq!(RequestId::from(ProgressToken::Integer(42)), id);
    }
}
