//! Error types for the MCP duplex engine

use thiserror::Error;

use crate::protocol::json_rpc::{error_codes, JSONRPCErrorInfo};
use crate::protocol::RequestId;

/// Errors that can occur in the MCP duplex engine
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Transport error
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The peer sent something the protocol does not allow (unknown id, malformed frame)
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A request id was registered twice while still pending
    #[error("Duplicate request id: {0}")]
    DuplicateId(RequestId),

    /// No pending request or running execution matches the id
    #[error("Unknown request id: {0}")]
    UnknownId(RequestId),

    /// Parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The peer advertised no handler for a callback capability
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// The requested feature is not supported by the peer
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// No response arrived within the configured bound
    #[error("Peer timeout: {0}")]
    PeerTimeout(String),

    /// The request was cancelled by either side
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The channel closed; fatal to the session
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Operation, tool, resource or prompt not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid parameters for an operation
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Tool or handler code failed while executing
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Failure reported by the peer with a code we do not map
    #[error("Peer error {0}: {1}")]
    PeerError(i32, String, Option<serde_json::Value>),

    /// The handshake has not completed yet
    #[error("Not initialized")]
    NotInitialized,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    UrlError(String),
}

/// Result type using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is the terminal `Cancelled` outcome rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Translate into the error object of a failure frame
    pub fn to_error_info(&self) -> JSONRPCErrorInfo {
        let (code, message, data) = match self {
            Error::ParseError(m) | Error::JsonError(m) => (error_codes::PARSE_ERROR, m.clone(), None),
            Error::ProtocolViolation(m) => (error_codes::INVALID_REQUEST, m.clone(), None),
            Error::DuplicateId(id) | Error::UnknownId(id) => {
                (error_codes::INVALID_REQUEST, self.to_string(), Some(serde_json::json!(id)))
            }
            Error::InvalidParams(m) => (error_codes::INVALID_PARAMS, m.clone(), None),
            Error::UnsupportedCapability(m) => (error_codes::UNSUPPORTED_CAPABILITY, m.clone(), None),
            Error::NotFound(m) => (error_codes::NOT_FOUND, m.clone(), None),
            Error::ExecutionError(m) => (error_codes::EXECUTION_ERROR, m.clone(), None),
            Error::PeerTimeout(m) => (error_codes::PEER_TIMEOUT, m.clone(), None),
            Error::Cancelled(m) => (error_codes::REQUEST_CANCELLED, m.clone(), None),
            Error::PeerError(code, m, data) => (*code, m.clone(), data.clone()),
            other => (error_codes::INTERNAL_ERROR, other.to_string(), None),
        };
        JSONRPCErrorInfo { code, message, data }
    }

    /// Translate the error object of a failure frame received from the peer
    pub fn from_error_info(info: JSONRPCErrorInfo) -> Self {
        match info.code {
            error_codes::METHOD_NOT_FOUND | error_codes::NOT_FOUND => Error::NotFound(info.message),
            error_codes::INVALID_PARAMS => Error::InvalidParams(info.message),
            error_codes::UNSUPPORTED_CAPABILITY => Error::UnsupportedCapability(info.message),
            error_codes::EXECUTION_ERROR => Error::ExecutionError(info.message),
            error_codes::PEER_TIMEOUT => Error::PeerTimeout(info.message),
            error_codes::REQUEST_CANCELLED => Error::Cancelled(info.message),
            code => Error::PeerError(code, info.message, info.data),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::UrlError(err.to_string())
    }
}
