//! Server message handler implementation

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, log};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::protocol::logging::SetLevelParams;
use crate::protocol::messages::{methods, InitializeParams, InitializeResult};
use crate::protocol::{JSONRPCNotification, LoggingMessageParams, RequestId, LATEST_PROTOCOL_VERSION};
use crate::session::{RequestContext, RequestHandler};

use super::service::{ServerService, ServiceRequest};
use super::state::Connection;
use super::{ClientCapabilities, InvocationContext, ServerOptions};

/// Handles requests and notifications a client sends to a server
pub(crate) struct ServerMessageHandler {
    /// Server options
    options: ServerOptions,
    /// Tools, resources and prompts
    service: Arc<dyn ServerService>,
    /// State of the one client on this session
    connection: Arc<RwLock<Connection>>,
}

impl ServerMessageHandler {
    /// Create a new server message handler
    pub fn new(options: ServerOptions, service: Arc<dyn ServerService>, connection: Arc<RwLock<Connection>>) -> Self {
        Self {
            options,
            service,
            connection,
        }
    }

    /// Handle an initialization request
    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams = serde_json::from_value(
            params.ok_or_else(|| Error::InvalidParams("Missing params in initialize request".to_string()))?,
        )
        .map_err(|e| Error::InvalidParams(format!("Invalid initialize params: {}", e)))?;

        debug!(
            "Initializing client {} {} (protocol {})",
            params.client_info.name, params.client_info.version, params.protocol_version
        );

        let capabilities = ClientCapabilities::from_json(&params.capabilities);
        self.connection.write().await.set_initialized(
            params.client_info.clone(),
            params.protocol_version,
            capabilities.clone(),
        );
        self.service.client_connected(&params.client_info, &capabilities).await;

        let result = InitializeResult {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: self.options.capabilities.to_json(),
            server_info: self.options.implementation.clone(),
            instructions: self.options.instructions.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle a logging/setLevel request
    async fn handle_set_level(&self, params: Option<Value>) -> Result<Value> {
        if !self.options.capabilities.logging {
            return Err(Error::NotFound("Logging not supported".to_string()));
        }
        let params: SetLevelParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| Error::InvalidParams(format!("Invalid logging/setLevel params: {}", e)))?;
        debug!("Client log level set to {:?}", params.level);
        self.connection.write().await.log_level = params.level;
        Ok(json!({}))
    }

    /// Reject service requests for features this server does not offer
    fn check_offered(&self, request: &ServiceRequest) -> Result<()> {
        let capabilities = &self.options.capabilities;
        let (offered, feature) = match request {
            ServiceRequest::ListTools | ServiceRequest::CallTool { .. } => (capabilities.tools, "Tools"),
            ServiceRequest::ListResources
            | ServiceRequest::ListResourceTemplates
            | ServiceRequest::ReadResource { .. } => (capabilities.resources, "Resources"),
            ServiceRequest::ListPrompts | ServiceRequest::GetPrompt { .. } => (capabilities.prompts, "Prompts"),
        };
        if offered {
            Ok(())
        } else {
            Err(Error::NotFound(format!("{} not supported", feature)))
        }
    }
}

#[async_trait]
impl RequestHandler for ServerMessageHandler {
    async fn handle_request(&self, ctx: RequestContext, method: &str, params: Option<Value>) -> Result<Value> {
        debug!("Handling request: {}", method);

        match method {
            methods::INITIALIZE => return self.handle_initialize(params).await,
            methods::PING => return Ok(json!({})),
            _ => {}
        }

        if !self.connection.read().await.initialized {
            return Err(Error::NotInitialized);
        }

        if method == methods::LOGGING_SET_LEVEL {
            return self.handle_set_level(params).await;
        }

        let request = ServiceRequest::from_wire(method, params)?
            .ok_or_else(|| Error::NotFound(format!("Method not found: {}", method)))?;
        self.check_offered(&request)?;

        let context = InvocationContext::new(ctx, self.connection.clone(), self.service.clone());
        self.service.handle_request(context, request).await?.into_value()
    }

    fn handle_log(&self, _scope: Option<&RequestId>, params: &LoggingMessageParams) {
        log!(
            target: params.logger.as_deref().unwrap_or("mcp::client"),
            params.level.to_log_level(),
            "{}",
            params.text().map(str::to_string).unwrap_or_else(|| params.data.to_string())
        );
    }

    async fn handle_notification(&self, notification: JSONRPCNotification) -> Result<()> {
        match notification.method.as_str() {
            methods::INITIALIZED => debug!("Client finished initialization"),
            methods::ROOTS_LIST_CHANGED => {
                debug!("Client roots changed");
                self.service.roots_updated().await;
            }
            other => debug!("Ignoring notification: {}", other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::json_rpc::error_codes;
    use crate::protocol::{JSONRPCMessage, JSONRPCRequest, Tool, CallToolResult};
    use crate::server::{Registry, ServerCapabilities};
    use crate::session::{Session, SessionOptions};
    use crate::transport::{MemoryTransport, Transport};

    async fn serve(capabilities: ServerCapabilities) -> (Session, MemoryTransport) {
        let registry = Registry::new().with_tool(Tool::new("echo", "Echo"), |_ctx, args| async move {
            Ok(CallToolResult::json(args))
        });
        let options = ServerOptions {
            capabilities,
            ..ServerOptions::default()
        };
        let connection = Arc::new(RwLock::new(Connection::new()));
        let handler = ServerMessageHandler::new(options, Arc::new(registry), connection);
        let (local, raw) = MemoryTransport::pair();
        let (session, _events) = Session::open(Arc::new(local), Arc::new(handler), SessionOptions::default())
            .await
            .unwrap();
        (session, raw)
    }

    async fn ask(raw: &MemoryTransport, id: &str, method: &str, params: Value) -> JSONRPCMessage {
        raw.send(JSONRPCMessage::Request(JSONRPCRequest::new(id, method, Some(params))))
            .await
            .unwrap();
        raw.receive().await.unwrap().unwrap()
    }

    fn init_params() -> Value {
        json!({
            "protocolVersion": LATEST_PROTOCOL_VERSION,
            "capabilities": {"elicitation": {}},
            "clientInfo": {"name": "raw", "version": "0"}
        })
    }

    #[tokio::test]
    async fn test_requests_before_initialize_fail() {
        let (_session, raw) = serve(ServerCapabilities { tools: true, ..ServerCapabilities::default() }).await;
        match ask(&raw, "c-1", methods::TOOLS_LIST, json!({})).await {
            JSONRPCMessage::Error(e) => assert_eq!(e.error.code, error_codes::INTERNAL_ERROR),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_initialize_then_call() {
        let (_session, raw) = serve(ServerCapabilities { tools: true, ..ServerCapabilities::default() }).await;

        match ask(&raw, "c-1", methods::INITIALIZE, init_params()).await {
            JSONRPCMessage::Response(r) => {
                assert_eq!(r.result["serverInfo"]["name"], "mcpx-server");
                assert!(r.result["capabilities"].get("tools").is_some());
                assert!(r.result["capabilities"].get("prompts").is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        match ask(&raw, "c-2", methods::TOOLS_CALL, json!({"name": "echo", "arguments": {"n": 7}})).await {
            JSONRPCMessage::Response(r) => assert_eq!(r.result["structuredContent"], json!({"n": 7})),
            other => panic!("unexpected {other:?}"),
        }

        match ask(&raw, "c-3", methods::TOOLS_CALL, json!({"name": "nope"})).await {
            JSONRPCMessage::Error(e) => assert_eq!(e.error.code, error_codes::NOT_FOUND),
            other => panic!("unexpected {other:?}"),
        }

        match ask(&raw, "c-4", methods::PROMPTS_LIST, json!({})).await {
            JSONRPCMessage::Error(e) => assert_eq!(e.error.code, error_codes::NOT_FOUND),
            other => panic!("unexpected {other:?}"),
        }
    }
}
