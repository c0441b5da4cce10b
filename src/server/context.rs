//! Tool-facing invocation context
//!
//! Every nested call made through an [`InvocationContext`] becomes a new
//! correlated request scoped to the tool call being executed, so cancelling
//! the tool call cancels whatever it is waiting on.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::protocol::messages::methods;
use crate::protocol::roots::ListRootsResult;
use crate::protocol::{
    CreateMessageParams, CreateMessageResult, ElicitRequestParams, ElicitResult, Implementation, LoggingLevel,
    LoggingMessageParams, RequestId, ResourceContents, Root,
};
use crate::session::RequestContext;

use super::service::{ServerService, ServiceRequest, ServiceResponse};
use super::state::Connection;
use super::ClientCapabilities;

/// Default output bound for [`InvocationContext::sample_text`]
const SAMPLE_TEXT_MAX_TOKENS: u32 = 1024;

/// Handle passed to tool, resource and prompt code for one client request
#[derive(Clone)]
pub struct InvocationContext {
    request: RequestContext,
    connection: Arc<RwLock<Connection>>,
    service: Arc<dyn ServerService>,
}

impl InvocationContext {
    pub(crate) fn new(
        request: RequestContext,
        connection: Arc<RwLock<Connection>>,
        service: Arc<dyn ServerService>,
    ) -> Self {
        Self {
            request,
            connection,
            service,
        }
    }

    /// Id of the client request being served
    pub fn request_id(&self) -> &RequestId {
        self.request.request_id()
    }

    /// The underlying session context
    pub fn request_context(&self) -> &RequestContext {
        &self.request
    }

    /// Whether the client cancelled this request
    pub fn is_cancelled(&self) -> bool {
        self.request.is_cancelled()
    }

    /// Resolves once the request is cancelled
    pub async fn cancelled(&self) {
        self.request.cancelled().await
    }

    /// Cancellation checkpoint; call before each unit of work
    pub fn checkpoint(&self) -> Result<()> {
        self.request.checkpoint()
    }

    /// The connected client's implementation info
    pub async fn client_info(&self) -> Option<Implementation> {
        self.connection.read().await.client_info.clone()
    }

    /// The connected client's capabilities
    pub async fn client_capabilities(&self) -> ClientCapabilities {
        self.connection.read().await.capabilities.clone()
    }

    async fn require(&self, offered: impl FnOnce(&ClientCapabilities) -> bool, name: &str) -> Result<()> {
        if offered(&self.connection.read().await.capabilities) {
            Ok(())
        } else {
            Err(Error::UnsupportedCapability(format!("Client does not support {}", name)))
        }
    }

    async fn nested<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T> {
        let value = self.request.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| Error::ParseError(format!("Invalid {} result: {}", method, e)))
    }

    /// Ask the client's end user for input.
    ///
    /// Without a schema the answer is a plain accept, decline or cancel.
    /// With one, accepted content that does not match it fails with
    /// `InvalidParams`.
    pub async fn elicit(&self, message: impl Into<String>, schema: Option<Value>) -> Result<ElicitResult> {
        self.require(|c| c.elicitation, "elicitation").await?;
        let params = match schema {
            Some(schema) => ElicitRequestParams::with_schema(message, schema),
            None => ElicitRequestParams::confirm(message),
        };
        let result: ElicitResult = self
            .nested(methods::ELICITATION_CREATE, Some(serde_json::to_value(&params)?))
            .await?;
        if let Some(schema) = &params.requested_schema {
            result.validate(schema)?;
        }
        Ok(result)
    }

    /// Generate a message with the client's model
    pub async fn sample(&self, params: CreateMessageParams) -> Result<CreateMessageResult> {
        self.require(|c| c.sampling, "sampling").await?;
        self.nested(methods::SAMPLING_CREATE_MESSAGE, Some(serde_json::to_value(params)?)).await
    }

    /// Generate text for a single user prompt
    pub async fn sample_text(&self, prompt: impl Into<String>) -> Result<String> {
        let result = self.sample(CreateMessageParams::prompt(prompt, SAMPLE_TEXT_MAX_TOKENS)).await?;
        Ok(result.as_text().to_string())
    }

    /// The roots the client authorized. Empty means no access.
    pub async fn list_roots(&self) -> Result<Vec<Root>> {
        self.require(|c| c.roots, "roots").await?;
        let result: ListRootsResult = self.nested(methods::ROOTS_LIST, None).await?;
        Ok(result.roots)
    }

    /// Send a log line to the client, subject to its `logging/setLevel` filter
    pub async fn log(&self, level: LoggingLevel, message: impl Into<String>, extra: Option<Value>) -> Result<()> {
        if !self.connection.read().await.forwards(level) {
            return Ok(());
        }
        self.request.log(LoggingMessageParams::message(level, message, extra)).await
    }

    /// Log at debug level
    pub async fn debug(&self, message: impl Into<String>) -> Result<()> {
        self.log(LoggingLevel::Debug, message, None).await
    }

    /// Log at info level
    pub async fn info(&self, message: impl Into<String>) -> Result<()> {
        self.log(LoggingLevel::Info, message, None).await
    }

    /// Log at warning level
    pub async fn warning(&self, message: impl Into<String>) -> Result<()> {
        self.log(LoggingLevel::Warning, message, None).await
    }

    /// Log at error level
    pub async fn error(&self, message: impl Into<String>) -> Result<()> {
        self.log(LoggingLevel::Error, message, None).await
    }

    /// Report progress; `total` absent means indeterminate
    pub async fn report_progress(&self, progress: f64, total: Option<f64>, message: Option<String>) -> Result<()> {
        self.request.report_progress(progress, total, message).await
    }

    /// Read one of this server's own resources
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let request = ServiceRequest::ReadResource { uri: uri.to_string() };
        match self.service.handle_request(self.clone(), request).await? {
            ServiceResponse::ReadResource { contents } => Ok(contents),
            other => Err(Error::InternalError(format!("Unexpected response to resource read: {:?}", other))),
        }
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("request", &self.request)
            .finish()
    }
}
