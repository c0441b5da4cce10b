//! Client message handler implementation

use async_trait::async_trait;
use log::{debug, log};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::messages::methods;
use crate::protocol::{JSONRPCNotification, LoggingMessageParams, ProgressParams, RequestId};
use crate::session::{RequestContext, RequestHandler};

use super::callbacks::{CallbackRegistry, Capability};

/// Handles requests and notifications the server sends to a client
pub(crate) struct ClientMessageHandler {
    /// Registered callback handlers
    registry: CallbackRegistry,
}

impl ClientMessageHandler {
    /// Create a new client message handler
    pub fn new(registry: CallbackRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RequestHandler for ClientMessageHandler {
    async fn handle_request(&self, ctx: RequestContext, method: &str, params: Option<Value>) -> Result<Value> {
        debug!("Handling request: {}", method);

        if method == methods::PING {
            return Ok(serde_json::json!({}));
        }

        let capability = Capability::from_method(method)
            .filter(Capability::expects_response)
            .ok_or_else(|| Error::NotFound(format!("Method not found: {}", method)))?;

        // Handlers never see the request context; a server-side cancel stops waiting on them.
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Cancelled(format!("{} cancelled by server", capability))),
            result = self.registry.invoke(capability, params) => result,
        }
    }

    fn handle_progress(&self, scope: &RequestId, params: &ProgressParams) {
        if !self.registry.progress(scope, params) {
            debug!(
                "Progress for {}: {}/{}",
                scope,
                params.progress,
                params.total.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string())
            );
        }
    }

    fn handle_log(&self, scope: Option<&RequestId>, params: &LoggingMessageParams) {
        if self.registry.log(scope, params) {
            return;
        }
        let text = params
            .text()
            .map(str::to_string)
            .unwrap_or_else(|| params.data.to_string());
        log!(
            target: params.logger.as_deref().unwrap_or("mcp::server"),
            params.level.to_log_level(),
            "{}",
            text
        );
    }

    async fn handle_notification(&self, notification: JSONRPCNotification) -> Result<()> {
        debug!("Handling notification: {}", notification.method);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::json_rpc::error_codes;
    use crate::protocol::{ElicitRequestParams, ElicitResult, JSONRPCMessage, JSONRPCRequest};
    use crate::session::{Session, SessionOptions};
    use crate::transport::{MemoryTransport, Transport};
    use crate::protocol::messages::CancelledParams;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn serve(registry: CallbackRegistry) -> (Session, MemoryTransport) {
        let (local, raw) = MemoryTransport::pair();
        let (session, _events) = Session::open(
            Arc::new(local),
            Arc::new(ClientMessageHandler::new(registry)),
            SessionOptions::default(),
        )
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

    #[tokio::test]
    async fn test_missing_handler_is_unsupported_capability() {
        let (_session, raw) = serve(CallbackRegistry::new()).await;
        match ask(&raw, "s-1", methods::SAMPLING_CREATE_MESSAGE, json!({})).await {
            JSONRPCMessage::Error(e) => assert_eq!(e.error.code, error_codes::UNSUPPORTED_CAPABILITY),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ping_and_elicitation() {
        let mut registry = CallbackRegistry::new();
        registry.set_elicitation(|_request: ElicitRequestParams| async { Ok(ElicitResult::cancel()) });
        let (_session, raw) = serve(registry).await;

        match ask(&raw, "s-1", methods::PING, json!({})).await {
            JSONRPCMessage::Response(r) => assert_eq!(r.result, json!({})),
            other => panic!("unexpected {other:?}"),
        }
        match ask(&raw, "s-2", methods::ELICITATION_CREATE, json!({"message": "Proceed?"})).await {
            JSONRPCMessage::Response(r) => assert_eq!(r.result, json!({"action": "cancel"})),
            other => panic!("unexpected {other:?}"),
        }
        match ask(&raw, "s-3", "tools/call", json!({})).await {
            JSONRPCMessage::Error(e) => assert_eq!(e.error.code, error_codes::NOT_FOUND),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_elicitation_never_reaches_handler() {
        let asked = Arc::new(AtomicUsize::new(0));
        let counter = asked.clone();
        let mut registry = CallbackRegistry::new();
        registry.set_elicitation(move |_request: ElicitRequestParams| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(ElicitResult::decline()) }
        });
        let (_session, raw) = serve(registry).await;

        for round in 0..50 {
            let id = format!("s-{}", round);
            raw.send(JSONRPCMessage::Request(JSONRPCRequest::new(
                id.as_str(),
                methods::ELICITATION_CREATE,
                Some(json!({"message": "Still there?"})),
            )))
            .await
            .unwrap();
            let cancel = CancelledParams {
                request_id: RequestId::from(id),
                reason: Some("changed my mind".to_string()),
            };
            raw.send(JSONRPCMessage::Notification(JSONRPCNotification::new(
                methods::CANCELLED,
                Some(serde_json::to_value(cancel).unwrap()),
            )))
            .await
            .unwrap();

            let sync = format!("sync-{}", round);
            match ask(&raw, &sync, methods::PING, json!({})).await {
                JSONRPCMessage::Response(r) => assert_eq!(r.id, RequestId::from(sync)),
                other => panic!("unexpected {other:?}"),
            }
        }

        assert_eq!(asked.load(Ordering::SeqCst), 0);
    }
}
