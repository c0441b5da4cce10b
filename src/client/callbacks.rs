//! Callback capabilities the server may invoke on the client

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::messages::methods;
use crate::protocol::roots::ListRootsResult;
use crate::protocol::{
    CreateMessageParams, CreateMessageResult, ElicitRequestParams, ElicitResult, LoggingMessageParams,
    ProgressParams, RequestId, Root,
};

/// Kinds of server-to-client callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Ask the end user for input
    Elicit,
    /// Generate text with the client's model
    Sample,
    /// List the roots the server may access
    ListRoots,
    /// Log line scoped to a request
    Log,
    /// Progress of a request
    ReportProgress,
}

impl Capability {
    /// Wire method carrying this capability
    pub fn method(&self) -> &'static str {
        match self {
            Self::Elicit => methods::ELICITATION_CREATE,
            Self::Sample => methods::SAMPLING_CREATE_MESSAGE,
            Self::ListRoots => methods::ROOTS_LIST,
            Self::Log => methods::MESSAGE,
            Self::ReportProgress => methods::PROGRESS,
        }
    }

    /// Capability carried by a wire method
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            methods::ELICITATION_CREATE => Some(Self::Elicit),
            methods::SAMPLING_CREATE_MESSAGE => Some(Self::Sample),
            methods::ROOTS_LIST => Some(Self::ListRoots),
            methods::MESSAGE => Some(Self::Log),
            methods::PROGRESS => Some(Self::ReportProgress),
            _ => None,
        }
    }

    /// Whether the capability is a correlated request rather than a notification
    pub fn expects_response(&self) -> bool {
        matches!(self, Self::Elicit | Self::Sample | Self::ListRoots)
    }

    /// Name used in capability negotiation
    pub fn name(&self) -> &'static str {
        match self {
            Self::Elicit => "elicitation",
            Self::Sample => "sampling",
            Self::ListRoots => "roots",
            Self::Log => "logging",
            Self::ReportProgress => "progress",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Answers elicitation requests
#[async_trait]
pub trait ElicitationHandler: Send + Sync {
    /// Present `request` to the user and report what they did
    async fn elicit(&self, request: ElicitRequestParams) -> Result<ElicitResult>;
}

#[async_trait]
impl<F, Fut> ElicitationHandler for F
where
    F: Fn(ElicitRequestParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ElicitResult>> + Send + 'static,
{
    async fn elicit(&self, request: ElicitRequestParams) -> Result<ElicitResult> {
        self(request).await
    }
}

/// Answers sampling requests
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    /// Generate a message; may take arbitrarily long
    async fn create_message(&self, request: CreateMessageParams) -> Result<CreateMessageResult>;
}

#[async_trait]
impl<F, Fut> SamplingHandler for F
where
    F: Fn(CreateMessageParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CreateMessageResult>> + Send + 'static,
{
    async fn create_message(&self, request: CreateMessageParams) -> Result<CreateMessageResult> {
        self(request).await
    }
}

/// Answers roots requests
#[async_trait]
pub trait RootsHandler: Send + Sync {
    /// Current roots; empty means no access granted
    async fn list_roots(&self) -> Result<Vec<Root>>;
}

#[async_trait]
impl<F, Fut> RootsHandler for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Root>>> + Send + 'static,
{
    async fn list_roots(&self) -> Result<Vec<Root>> {
        self().await
    }
}

/// A fixed list of roots
#[derive(Debug, Clone, Default)]
pub struct StaticRoots {
    roots: Vec<Root>,
}

impl StaticRoots {
    /// Serve `roots` for every request
    pub fn new(roots: Vec<Root>) -> Self {
        Self { roots }
    }
}

#[async_trait]
impl RootsHandler for StaticRoots {
    async fn list_roots(&self) -> Result<Vec<Root>> {
        Ok(self.roots.clone())
    }
}

/// Receives log lines; must not block
pub trait LogHandler: Send + Sync {
    /// A log line, scoped to one of our requests or unscoped
    fn on_log(&self, scope: Option<&RequestId>, params: &LoggingMessageParams);
}

impl<F> LogHandler for F
where
    F: Fn(Option<&RequestId>, &LoggingMessageParams) + Send + Sync,
{
    fn on_log(&self, scope: Option<&RequestId>, params: &LoggingMessageParams) {
        self(scope, params)
    }
}

/// Receives progress reports; must not block
pub trait ProgressHandler: Send + Sync {
    /// Progress of one of our requests
    fn on_progress(&self, scope: &RequestId, params: &ProgressParams);
}

impl<F> ProgressHandler for F
where
    F: Fn(&RequestId, &ProgressParams) + Send + Sync,
{
    fn on_progress(&self, scope: &RequestId, params: &ProgressParams) {
        self(scope, params)
    }
}

/// Callback handlers registered for one client session, keyed by capability
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    elicitation: Option<Arc<dyn ElicitationHandler>>,
    sampling: Option<Arc<dyn SamplingHandler>>,
    roots: Option<Arc<dyn RootsHandler>>,
    log: Option<Arc<dyn LogHandler>>,
    progress: Option<Arc<dyn ProgressHandler>>,
    roots_list_changed: bool,
}

impl CallbackRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the elicitation handler
    pub fn set_elicitation(&mut self, handler: impl ElicitationHandler + 'static) {
        self.elicitation = Some(Arc::new(handler));
    }

    /// Register the sampling handler
    pub fn set_sampling(&mut self, handler: impl SamplingHandler + 'static) {
        self.sampling = Some(Arc::new(handler));
    }

    /// Register the roots handler
    pub fn set_roots(&mut self, handler: impl RootsHandler + 'static) {
        self.roots = Some(Arc::new(handler));
    }

    /// Advertise that roots changes will be announced
    pub fn set_roots_list_changed(&mut self, enable: bool) {
        self.roots_list_changed = enable;
    }

    /// Register the log handler
    pub fn set_log(&mut self, handler: impl LogHandler + 'static) {
        self.log = Some(Arc::new(handler));
    }

    /// Register the progress handler
    pub fn set_progress(&mut self, handler: impl ProgressHandler + 'static) {
        self.progress = Some(Arc::new(handler));
    }

    /// Whether a handler is registered for `capability`
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Elicit => self.elicitation.is_some(),
            Capability::Sample => self.sampling.is_some(),
            Capability::ListRoots => self.roots.is_some(),
            Capability::Log => self.log.is_some(),
            Capability::ReportProgress => self.progress.is_some(),
        }
    }

    /// Whether roots list changes are announced
    pub fn announces_roots_changes(&self) -> bool {
        self.roots.is_some() && self.roots_list_changed
    }

    /// Capabilities advertised during initialization: only those with a handler
    pub fn advertised(&self) -> Value {
        let mut capabilities = serde_json::Map::new();
        if self.supports(Capability::Elicit) {
            capabilities.insert("elicitation".to_string(), serde_json::json!({}));
        }
        if self.supports(Capability::Sample) {
            capabilities.insert("sampling".to_string(), serde_json::json!({}));
        }
        if self.supports(Capability::ListRoots) {
            capabilities.insert(
                "roots".to_string(),
                serde_json::json!({ "listChanged": self.roots_list_changed }),
            );
        }
        Value::Object(capabilities)
    }

    /// Invoke the handler of a request/response capability with raw params
    pub async fn invoke(&self, capability: Capability, params: Option<Value>) -> Result<Value> {
        let params = params.unwrap_or_else(|| Value::Object(Default::default()));
        match capability {
            Capability::Elicit => {
                let handler = self.elicitation.as_ref().ok_or_else(|| unsupported(capability))?;
                let request: ElicitRequestParams = parse(params)?;
                Ok(serde_json::to_value(handler.elicit(request).await?)?)
            }
            Capability::Sample => {
                let handler = self.sampling.as_ref().ok_or_else(|| unsupported(capability))?;
                let request: CreateMessageParams = parse(params)?;
                Ok(serde_json::to_value(handler.create_message(request).await?)?)
            }
            Capability::ListRoots => {
                let handler = self.roots.as_ref().ok_or_else(|| unsupported(capability))?;
                let roots = handler.list_roots().await?;
                Ok(serde_json::to_value(ListRootsResult { roots })?)
            }
            Capability::Log | Capability::ReportProgress => Err(Error::InvalidParams(format!(
                "{} is delivered as a notification",
                capability
            ))),
        }
    }

    /// Forward a log line to the log handler. Returns false when none is registered.
    pub fn log(&self, scope: Option<&RequestId>, params: &LoggingMessageParams) -> bool {
        match &self.log {
            Some(handler) => {
                handler.on_log(scope, params);
                true
            }
            None => false,
        }
    }

    /// Forward progress to the progress handler. Returns false when none is registered.
    pub fn progress(&self, scope: &RequestId, params: &ProgressParams) -> bool {
        match &self.progress {
            Some(handler) => {
                handler.on_progress(scope, params);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("elicitation", &self.elicitation.is_some())
            .field("sampling", &self.sampling.is_some())
            .field("roots", &self.roots.is_some())
            .field("log", &self.log.is_some())
            .field("progress", &self.progress.is_some())
            .field("roots_list_changed", &self.roots_list_changed)
            .finish()
    }
}

fn unsupported(capability: Capability) -> Error {
    Error::UnsupportedCapability(format!("client has no {} handler", capability))
}

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| Error::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ElicitAction;
    use serde_json::json;

    #[test]
    fn test_capability_methods() {
        for capability in [
            Capability::Elicit,
            Capability::Sample,
            Capability::ListRoots,
            Capability::Log,
            Capability::ReportProgress,
        ] {
            assert_eq!(Capability::from_method(capability.method()), Some(capability));
        }
        assert_eq!(Capability::from_method("tools/call"), None);
        assert!(!Capability::Log.expects_response());
    }

    #[test]
    fn test_only_registered_capabilities_are_advertised() {
        let mut registry = CallbackRegistry::new();
        assert_eq!(registry.advertised(), json!({}));

        registry.set_elicitation(|_request: ElicitRequestParams| async { Ok(ElicitResult::decline()) });
        registry.set_roots(StaticRoots::default());
        registry.set_roots_list_changed(true);
        assert_eq!(
            registry.advertised(),
            json!({"elicitation": {}, "roots": {"listChanged": true}})
        );
        assert!(registry.announces_roots_changes());
    }

    #[tokio::test]
    async fn test_invoke_routes_by_capability() {
        let mut registry = CallbackRegistry::new();
        registry.set_elicitation(|request: ElicitRequestParams| async move {
            assert_eq!(request.message, "Continue?");
            Ok(ElicitResult::accept_empty())
        });

        let answer = registry
            .invoke(Capability::Elicit, Some(json!({"message": "Continue?"})))
            .await
            .unwrap();
        let answer: ElicitResult = serde_json::from_value(answer).unwrap();
        assert_eq!(answer.action, ElicitAction::Accept);

        match registry.invoke(Capability::Sample, None).await {
            Err(Error::UnsupportedCapability(message)) => assert!(message.contains("sampling")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            registry.invoke(Capability::Elicit, Some(json!({"nope": 1}))).await,
            Err(Error::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_static_roots() {
        let mut registry = CallbackRegistry::new();
        registry.set_roots(StaticRoots::new(vec![Root::new("file:///srv/data").unwrap()]));
        let answer = registry.invoke(Capability::ListRoots, None).await.unwrap();
        assert_eq!(answer, json!({"roots": [{"uri": "file:///srv/data"}]}));
    }

    #[test]
    fn test_notification_handlers() {
        let mut registry = CallbackRegistry::new();
        let params = LoggingMessageParams::message(crate::protocol::LoggingLevel::Info, "hi", None);
        assert!(!registry.log(None, &params));
        registry.set_log(|_scope: Option<&RequestId>, params: &LoggingMessageParams| {
            assert_eq!(params.text(), Some("hi"));
        });
        assert!(registry.log(None, &params));
    }
}
