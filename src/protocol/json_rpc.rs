//! JSON-RPC message types for the Model Context Protocol

use serde::{Deserialize, Serialize};

use super::RequestId;

/// JSON-RPC version used by the MCP protocol
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes
pub mod error_codes {
    /// Invalid JSON was received by the server.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Custom MCP error codes can start at this value
    pub const MCP_ERROR_START: i32 = -32000;
    /// The receiver has no handler for the requested callback capability.
    pub const UNSUPPORTED_CAPABILITY: i32 = -32001;
    /// The named tool, resource or prompt does not exist.
    pub const NOT_FOUND: i32 = -32002;
    /// Tool or handler code failed.
    pub const EXECUTION_ERROR: i32 = -32003;
    /// A nested call did not complete in time.
    pub const PEER_TIMEOUT: i32 = -32004;
    /// The request was cancelled; a terminal outcome, not a failure.
    pub const REQUEST_CANCELLED: i32 = -32800;
}

/// A JSON-RPC message that can be sent or received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JSONRPCMessage {
    /// A request that expects a response
    Request(JSONRPCRequest),
    /// A notification that does not expect a response
    Notification(JSONRPCNotification),
    /// A successful response to a request
    Response(JSONRPCResponse),
    /// An error response to a request
    Error(JSONRPCError),
}

impl JSONRPCMessage {
    /// The request id this message carries, if any
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Response(r) => Some(&r.id),
            Self::Error(e) => Some(&e.id),
            Self::Notification(_) => None,
        }
    }

    /// The method name, for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(&r.method),
            Self::Notification(n) => Some(&n.method),
            _ => None,
        }
    }
}

/// A JSON-RPC request that expects a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JSONRPCRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Request ID
    pub id: RequestId,
    /// Method name
    pub method: String,
    /// Optional parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JSONRPCRequest {
    /// Create a new JSON-RPC request
    pub fn new<I: Into<RequestId>>(id: I, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC notification that does not expect a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JSONRPCNotification {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Optional parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JSONRPCNotification {
    /// Create a new JSON-RPC notification
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A successful JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JSONRPCResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Request ID that this is responding to
    pub id: RequestId,
    /// Result value
    pub result: serde_json::Value,
}

impl JSONRPCResponse {
    /// Create a new JSON-RPC response
    pub fn new<I: Into<RequestId>>(id: I, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result,
        }
    }
}

/// A JSON-RPC error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JSONRPCError {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Request ID that this is responding to
    pub id: RequestId,
    /// Error information
    pub error: JSONRPCErrorInfo,
}

impl JSONRPCError {
    /// Create a new JSON-RPC error
    pub fn new<I: Into<RequestId>>(id: I, code: i32, message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            error: JSONRPCErrorInfo {
                code,
                message: message.into(),
                data,
            },
        }
    }

    /// Create an error response from an already built error object
    pub fn from_info<I: Into<RequestId>>(id: I, error: JSONRPCErrorInfo) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            error,
        }
    }

    /// Whether this frame reports a cancelled outcome rather than a failure
    pub fn is_cancellation(&self) -> bool {
        self.error.code == error_codes::REQUEST_CANCELLED
    }
}

/// JSON-RPC error information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JSONRPCErrorInfo {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_frames() {
        let request: JSONRPCMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": "a-1", "method": "tools/call"})).unwrap();
        assert!(matches!(request, JSONRPCMessage::Request(_)));
        assert_eq!(request.method(), Some("tools/call"));

        let notification: JSONRPCMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {}}))
                .unwrap();
        assert!(matches!(notification, JSONRPCMessage::Notification(_)));
        assert_eq!(notification.id(), None);

        let response: JSONRPCMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3, "result": {"ok": true}})).unwrap();
        assert!(matches!(response, JSONRPCMessage::Response(_)));

        let error: JSONRPCMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": -32800, "message": "cancelled"}
        }))
        .unwrap();
        match error {
            JSONRPCMessage::Error(e) => assert!(e.is_cancellation()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_malformed_frame_is_rejected() {
        let result: Result<JSONRPCMessage, _> = serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1}));
        assert!(result.is_err());
    }
}
