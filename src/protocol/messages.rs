//! Method names and `_meta` helpers shared by requests and notifications

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Implementation, ProgressToken, RequestId};

/// Method names understood by the engine and its client/server surfaces
pub mod methods {
    /// Handshake request sent by the client
    pub const INITIALIZE: &str = "initialize";
    /// Sent by the client once the handshake completed
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Liveness check, answered by either side
    pub const PING: &str = "ping";
    /// List server tools
    pub const TOOLS_LIST: &str = "tools/list";
    /// Invoke a server tool
    pub const TOOLS_CALL: &str = "tools/call";
    /// List enumerable resources
    pub const RESOURCES_LIST: &str = "resources/list";
    /// List enumerable resource templates
    pub const RESOURCE_TEMPLATES_LIST: &str = "resources/templates/list";
    /// Read a resource by URI
    pub const RESOURCES_READ: &str = "resources/read";
    /// List prompts
    pub const PROMPTS_LIST: &str = "prompts/list";
    /// Render a prompt
    pub const PROMPTS_GET: &str = "prompts/get";
    /// Adjust the minimum level of forwarded log messages
    pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
    /// Server to client: ask the end user for input
    pub const ELICITATION_CREATE: &str = "elicitation/create";
    /// Server to client: generate text with the client's model
    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
    /// Server to client: list authorized roots
    pub const ROOTS_LIST: &str = "roots/list";
    /// Client to server: the roots list changed
    pub const ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";
    /// Progress for an in-flight request
    pub const PROGRESS: &str = "notifications/progress";
    /// Log line scoped to an in-flight request
    pub const MESSAGE: &str = "notifications/message";
    /// Cancellation of a request
    pub const CANCELLED: &str = "notifications/cancelled";
}

const META: &str = "_meta";
const RELATED_REQUEST_ID: &str = "relatedRequestId";
const PROGRESS_TOKEN: &str = "progressToken";

/// Parameters of `notifications/cancelled`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelledParams {
    /// The request being cancelled
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    /// Optional human readable reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Parameters of the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version the client speaks
    pub protocol_version: String,
    /// Callback capabilities the client has handlers for
    pub capabilities: Value,
    /// Client implementation
    pub client_info: Implementation,
}

/// Result of the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version the server speaks
    pub protocol_version: String,
    /// Features the server offers
    pub capabilities: Value,
    /// Server implementation
    pub server_info: Implementation,
    /// Usage hints for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

fn meta(params: Option<&Value>) -> Option<&serde_json::Map<String, Value>> {
    params?.get(META)?.as_object()
}

fn meta_mut(params: &mut Option<Value>) -> Option<&mut serde_json::Map<String, Value>> {
    let params = params.get_or_insert_with(|| Value::Object(Default::default()));
    let object = params.as_object_mut()?;
    object
        .entry(META)
        .or_insert_with(|| Value::Object(Default::default()))
        .as_object_mut()
}

/// The request a nested request or scoped log line belongs to
pub fn related_request_id(params: Option<&Value>) -> Option<RequestId> {
    meta(params)
        .and_then(|m| m.get(RELATED_REQUEST_ID))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Tag params with the request they are scoped to.
///
/// Non-object params are left untouched.
pub fn set_related_request_id(params: &mut Option<Value>, id: &RequestId) {
    if let Some(meta) = meta_mut(params) {
        meta.insert(RELATED_REQUEST_ID.to_string(), serde_json::json!(id));
    }
}

/// The progress token a requester attached to its request
pub fn progress_token(params: Option<&Value>) -> Option<ProgressToken> {
    meta(params)
        .and_then(|m| m.get(PROGRESS_TOKEN))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Attach a progress token to outgoing request params
pub fn set_progress_token(params: &mut Option<Value>, token: &ProgressToken) {
    if let Some(meta) = meta_mut(params) {
        meta.insert(PROGRESS_TOKEN.to_string(), serde_json::json!(token));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_meta_roundtrip_keeps_arguments() {
        let mut params = Some(json!({"name": "long_execution", "arguments": {"count": 10}}));
        let id = RequestId::from("s1-4");
        set_related_request_id(&mut params, &id);
        set_progress_token(&mut params, &ProgressToken::from(id.clone()));

        assert_eq!(related_request_id(params.as_ref()), Some(id.clone()));
        assert_eq!(progress_token(params.as_ref()), Some(ProgressToken::String("s1-4".to_string())));
        assert_eq!(params.unwrap()["arguments"]["count"], 10);
    }

    #[test]
    fn test_meta_on_empty_params() {
        let mut params = None;
        set_related_request_id(&mut params, &RequestId::Integer(9));
        assert_eq!(related_request_id(params.as_ref()), Some(RequestId::Integer(9)));
        assert_eq!(progress_token(params.as_ref()), None);
        assert_eq!(related_request_id(None), None);
    }
}
