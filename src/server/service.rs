//! Server service interface for implementing MCP services
//!
//! A [`ServerService`] owns the tools, resources and prompts a server exposes.
//! The session layer only knows how to invoke it and observe the outcome.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::messages::methods;
use crate::protocol::prompts::{GetPromptParams, GetPromptResult, ListPromptsResult};
use crate::protocol::resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult,
};
use crate::protocol::tools::{CallToolParams, ListToolsResult};
use crate::protocol::{CallToolResult, Implementation, Prompt, PromptMessage, Resource, ResourceContents, ResourceTemplate, Tool};

use super::{ClientCapabilities, InvocationContext};

/// Service request types
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceRequest {
    /// List resources
    ListResources,
    /// List resource templates
    ListResourceTemplates,
    /// Read a resource
    ReadResource {
        /// Resource URI
        uri: String,
    },
    /// List prompts
    ListPrompts,
    /// Get a prompt
    GetPrompt {
        /// Prompt name
        name: String,
        /// Prompt arguments
        arguments: HashMap<String, String>,
    },
    /// List tools
    ListTools,
    /// Call a tool
    CallTool {
        /// Tool name
        name: String,
        /// Tool arguments
        arguments: Option<Value>,
    },
}

impl ServiceRequest {
    /// Decode a wire request. `None` when the method is not a service method.
    pub fn from_wire(method: &str, params: Option<Value>) -> Result<Option<Self>> {
        let request = match method {
            methods::RESOURCES_LIST => Self::ListResources,
            methods::RESOURCE_TEMPLATES_LIST => Self::ListResourceTemplates,
            methods::RESOURCES_READ => {
                let params: ReadResourceParams = decode(method, params)?;
                Self::ReadResource { uri: params.uri }
            }
            methods::PROMPTS_LIST => Self::ListPrompts,
            methods::PROMPTS_GET => {
                let params: GetPromptParams = decode(method, params)?;
                Self::GetPrompt {
                    name: params.name,
                    arguments: params.arguments,
                }
            }
            methods::TOOLS_LIST => Self::ListTools,
            methods::TOOLS_CALL => {
                let params: CallToolParams = decode(method, params)?;
                Self::CallTool {
                    name: params.name,
                    arguments: params.arguments,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(request))
    }
}

fn decode<T: serde::de::DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T> {
    let params = params.ok_or_else(|| Error::InvalidParams(format!("Missing params in {} request", method)))?;
    serde_json::from_value(params).map_err(|e| Error::InvalidParams(format!("Invalid {} params: {}", method, e)))
}

/// Service response types
#[derive(Debug, Clone)]
pub enum ServiceResponse {
    /// List resources response
    ListResources {
        /// Resources
        resources: Vec<Resource>,
    },
    /// List resource templates response
    ListResourceTemplates {
        /// Resource templates
        templates: Vec<ResourceTemplate>,
    },
    /// Read resource response
    ReadResource {
        /// Resource contents
        contents: Vec<ResourceContents>,
    },
    /// List prompts response
    ListPrompts {
        /// Prompts
        prompts: Vec<Prompt>,
    },
    /// Get prompt response
    GetPrompt {
        /// Prompt messages
        messages: Vec<PromptMessage>,
        /// Prompt description
        description: Option<String>,
    },
    /// List tools response
    ListTools {
        /// Tools
        tools: Vec<Tool>,
    },
    /// Call tool response
    CallTool {
        /// Tool call result
        result: CallToolResult,
    },
}

impl ServiceResponse {
    /// Encode as the `result` member of a response frame
    pub fn into_value(self) -> Result<Value> {
        let value = match self {
            Self::ListResources { resources } => serde_json::to_value(ListResourcesResult { resources })?,
            Self::ListResourceTemplates { templates } => serde_json::to_value(ListResourceTemplatesResult {
                resource_templates: templates,
            })?,
            Self::ReadResource { contents } => serde_json::to_value(ReadResourceResult { contents })?,
            Self::ListPrompts { prompts } => serde_json::to_value(ListPromptsResult { prompts })?,
            Self::GetPrompt { messages, description } => {
                serde_json::to_value(GetPromptResult { description, messages })?
            }
            Self::ListTools { tools } => serde_json::to_value(ListToolsResult { tools })?,
            Self::CallTool { result } => serde_json::to_value(result)?,
        };
        Ok(value)
    }
}

/// Server service interface
#[async_trait]
pub trait ServerService: Send + Sync {
    /// Handle a service request
    async fn handle_request(&self, context: InvocationContext, request: ServiceRequest) -> Result<ServiceResponse>;

    /// Notification that a client has completed the handshake
    async fn client_connected(&self, _client_info: &Implementation, _capabilities: &ClientCapabilities) {}

    /// Notification that a client's roots list has changed
    async fn roots_updated(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_wire() {
        let request = ServiceRequest::from_wire(
            methods::TOOLS_CALL,
            Some(json!({"name": "echo", "arguments": {"x": 1}, "_meta": {"progressToken": "a-1"}})),
        )
        .unwrap();
        assert_eq!(
            request,
            Some(ServiceRequest::CallTool {
                name: "echo".to_string(),
                arguments: Some(json!({"x": 1})),
            })
        );

        assert_eq!(
            ServiceRequest::from_wire(methods::TOOLS_LIST, None).unwrap(),
            Some(ServiceRequest::ListTools)
        );
        assert!(ServiceRequest::from_wire("resources/subscribe", None).unwrap().is_none());
        assert!(matches!(
            ServiceRequest::from_wire(methods::RESOURCES_READ, None),
            Err(Error::InvalidParams(_))
        ));
    }

    #[test]
    fn test_into_value() {
        let value = ServiceResponse::ListResourceTemplates { templates: vec![] }.into_value().unwrap();
        assert_eq!(value, json!({"resourceTemplates": []}));
    }
}
