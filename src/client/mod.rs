//! MCP client implementation
//!
//! A [`Client`] wraps one [`Session`] with the client half of the protocol:
//! the `initialize` handshake, typed calls into the server's tools, resources
//! and prompts, and a [`CallbackRegistry`] answering the server's nested
//! elicitation, sampling and roots requests.

mod builder;
mod callbacks;
mod handler;
mod state;

pub use builder::ClientBuilder;
pub use callbacks::{
    CallbackRegistry, Capability, ElicitationHandler, LogHandler, ProgressHandler, RootsHandler, SamplingHandler,
    StaticRoots,
};
pub use state::{ConnectionState, ServerInfo};

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};

use crate::error::{Error, Result};
use crate::protocol::logging::SetLevelParams;
use crate::protocol::messages::{methods, InitializeParams, InitializeResult};
use crate::protocol::prompts::{GetPromptParams, GetPromptResult, ListPromptsResult};
use crate::protocol::resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult,
};
use crate::protocol::tools::{CallToolParams, ListToolsResult};
use crate::protocol::{
    CallToolResult, Implementation, LoggingLevel, ProgressParams, Prompt, RequestId, Resource, ResourceContents,
    ResourceTemplate, Tool, LATEST_PROTOCOL_VERSION,
};
use crate::session::{OutboundRequest, PendingCall, Session, SessionEvent, SessionOptions};
use crate::transport::Transport;
use crate::utils::expand_template;

use self::handler::ClientMessageHandler;
use self::state::ClientState;

/// MCP client options
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Client implementation info
    pub implementation: Implementation,
    /// Default timeout for requests in milliseconds (0 = no timeout)
    pub default_timeout_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            implementation: Implementation::new("mcpx-client", env!("CARGO_PKG_VERSION")),
            default_timeout_ms: 30000, // 30 seconds
        }
    }
}

/// Server capabilities
#[derive(Debug, Clone, Default)]
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
    /// Experimental capabilities
    pub experimental: Vec<String>,
}

impl ServerCapabilities {
    /// Parse server capabilities from JSON
    pub fn from_json(json: &Value) -> Self {
        let mut capabilities = ServerCapabilities::default();

        // Check for logging capability
        if json.get("logging").is_some() {
            capabilities.logging = true;
        }

        if let Some(prompts) = json.get("prompts") {
            capabilities.prompts = true;
            capabilities.prompts_list_changed = list_changed(prompts);
        }

        if let Some(resources) = json.get("resources") {
            capabilities.resources = true;
            capabilities.resources_list_changed = list_changed(resources);
        }

        if let Some(tools) = json.get("tools") {
            capabilities.tools = true;
            capabilities.tools_list_changed = list_changed(tools);
        }

        // Check for experimental capabilities
        if let Some(experimental) = json.get("experimental").and_then(Value::as_object) {
            capabilities.experimental = experimental.keys().cloned().collect();
        }

        capabilities
    }
}

fn list_changed(section: &Value) -> bool {
    section.get("listChanged").and_then(Value::as_bool).unwrap_or(false)
}

/// Server features a client operation depends on
#[derive(Debug, Clone, Copy)]
enum Feature {
    Tools,
    Resources,
    Prompts,
    Logging,
}

impl Feature {
    fn offered_by(self, capabilities: &ServerCapabilities) -> bool {
        match self {
            Feature::Tools => capabilities.tools,
            Feature::Resources => capabilities.resources,
            Feature::Prompts => capabilities.prompts,
            Feature::Logging => capabilities.logging,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Feature::Tools => "tools",
            Feature::Resources => "resources",
            Feature::Prompts => "prompts",
            Feature::Logging => "logging",
        }
    }
}

/// MCP client session
#[derive(Clone)]
pub struct Client {
    /// Correlation engine for this connection
    session: Session,
    /// Client state
    state: Arc<RwLock<ClientState>>,
    /// Client options
    options: ClientOptions,
    /// Whether the roots list changed notification was advertised
    roots_list_changed: bool,
}

impl Client {
    /// Open a session over `transport` and run the `initialize` handshake.
    ///
    /// Only the capabilities with a handler in `registry` are advertised.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        registry: CallbackRegistry,
        options: ClientOptions,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>)> {
        let advertised = registry.advertised();
        let roots_list_changed = registry.announces_roots_changes();

        let session_options = SessionOptions::builder()
            .default_timeout_ms(options.default_timeout_ms)
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        let handler = Arc::new(ClientMessageHandler::new(registry));
        let (session, events) = Session::open(transport, handler, session_options).await?;

        let client = Self {
            session,
            state: Arc::new(RwLock::new(ClientState::new())),
            options,
            roots_list_changed,
        };

        // Mark the client disconnected once the session ends, whoever ends it.
        let watcher = client.clone();
        tokio::spawn(async move {
            watcher.session.closed().await;
            watcher.state.write().await.set_disconnected();
        });

        if let Err(e) = client.initialize(advertised).await {
            client.session.close().await;
            return Err(e);
        }
        Ok((client, events))
    }

    /// Perform the handshake
    async fn initialize(&self, capabilities: Value) -> Result<()> {
        self.state.write().await.set_initializing();

        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities,
            client_info: self.options.implementation.clone(),
        };
        let result: InitializeResult = self.call(methods::INITIALIZE, Some(serde_json::to_value(params)?)).await?;
        debug!(
            "Initialized with {} {} (protocol {})",
            result.server_info.name, result.server_info.version, result.protocol_version
        );

        self.state.write().await.set_initialized(ServerInfo {
            implementation: result.server_info,
            protocol_version: result.protocol_version,
            capabilities: ServerCapabilities::from_json(&result.capabilities),
            instructions: result.instructions,
        });

        self.session.notify(methods::INITIALIZED, None).await
    }

    /// Send a request and decode its result
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T> {
        let value = self.session.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| Error::ParseError(format!("Invalid {} result: {}", method, e)))
    }

    /// Fail unless the handshake completed and the server offers `feature`
    async fn require(&self, feature: Feature) -> Result<()> {
        let state = self.state.read().await;
        let server = state.server().filter(|_| state.is_initialized()).ok_or(Error::NotInitialized)?;
        if feature.offered_by(&server.capabilities) {
            Ok(())
        } else {
            Err(Error::UnsupportedFeature(format!("Server does not support {}", feature.name())))
        }
    }

    /// The underlying session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// What the server reported during the handshake
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.state.read().await.server().cloned()
    }

    /// Current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection_state()
    }

    /// Call a tool and wait for its result
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        let call = self.start_tool_call(name, arguments, None).await?;
        Self::tool_result(call).await
    }

    /// Start a tool call without waiting for it.
    ///
    /// The returned call exposes its id so it can be passed to [`Client::cancel`].
    pub async fn start_tool_call(
        &self,
        name: &str,
        arguments: Option<Value>,
        observer: Option<Box<dyn Fn(&ProgressParams) + Send + Sync>>,
    ) -> Result<PendingCall> {
        self.require(Feature::Tools).await?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let mut request = OutboundRequest::new(methods::TOOLS_CALL, Some(serde_json::to_value(params)?));
        if let Some(observer) = observer {
            request = request.with_progress_observer(move |p: &ProgressParams| observer(p));
        }
        self.session.send_request(request).await
    }

    /// Wait for a call started with [`Client::start_tool_call`]
    pub async fn tool_result(call: PendingCall) -> Result<CallToolResult> {
        let value = call.result().await?;
        serde_json::from_value(value).map_err(|e| Error::ParseError(format!("Invalid tools/call result: {}", e)))
    }

    /// Cancel one of our outstanding requests
    pub async fn cancel(&self, id: &RequestId, reason: Option<String>) -> Result<()> {
        self.session.cancel(id, reason).await
    }

    /// List available tools
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.require(Feature::Tools).await?;
        let result: ListToolsResult = self.call(methods::TOOLS_LIST, None).await?;
        Ok(result.tools)
    }

    /// List available resources
    pub async fn list_resources(&self) -> Result<Vec<Resource>> {
        self.require(Feature::Resources).await?;
        let result: ListResourcesResult = self.call(methods::RESOURCES_LIST, None).await?;
        Ok(result.resources)
    }

    /// List available resource templates
    pub async fn list_resource_templates(&self) -> Result<Vec<ResourceTemplate>> {
        self.require(Feature::Resources).await?;
        let result: ListResourceTemplatesResult = self.call(methods::RESOURCE_TEMPLATES_LIST, None).await?;
        Ok(result.resource_templates)
    }

    /// Read a resource
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        self.require(Feature::Resources).await?;
        let params = ReadResourceParams { uri: uri.to_string() };
        let result: ReadResourceResult = self.call(methods::RESOURCES_READ, Some(serde_json::to_value(params)?)).await?;
        Ok(result.contents)
    }

    /// Expand a resource template and read the resulting URI
    pub async fn read_resource_template(
        &self,
        template: &str,
        params: &HashMap<String, String>,
    ) -> Result<Vec<ResourceContents>> {
        let uri = expand_template(template, params)?;
        self.read_resource(&uri).await
    }

    /// List available prompts
    pub async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        self.require(Feature::Prompts).await?;
        let result: ListPromptsResult = self.call(methods::PROMPTS_LIST, None).await?;
        Ok(result.prompts)
    }

    /// Render a prompt
    pub async fn get_prompt(&self, name: &str, arguments: HashMap<String, String>) -> Result<GetPromptResult> {
        self.require(Feature::Prompts).await?;
        let params = GetPromptParams {
            name: name.to_string(),
            arguments,
        };
        self.call(methods::PROMPTS_GET, Some(serde_json::to_value(params)?)).await
    }

    /// Set the minimum level of log messages the server forwards
    pub async fn set_logging_level(&self, level: LoggingLevel) -> Result<()> {
        self.require(Feature::Logging).await?;
        let params = SetLevelParams { level };
        self.session
            .request(methods::LOGGING_SET_LEVEL, Some(serde_json::to_value(params)?))
            .await?;
        Ok(())
    }

    /// Check the server is alive
    pub async fn ping(&self) -> Result<()> {
        self.session.request(methods::PING, Some(json!({}))).await?;
        Ok(())
    }

    /// Tell the server the roots list changed
    pub async fn notify_roots_changed(&self) -> Result<()> {
        if !self.roots_list_changed {
            return Err(Error::UnsupportedFeature(
                "roots list changed notifications were not advertised".to_string(),
            ));
        }
        self.session.notify(methods::ROOTS_LIST_CHANGED, None).await
    }

    /// Close the session; pending requests fail with `ChannelClosed`
    pub async fn close(&self) {
        self.session.close().await;
        self.state.write().await.set_disconnected();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("implementation", &self.options.implementation)
            .finish()
    }
}
