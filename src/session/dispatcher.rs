//! Inbound frame routing

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error};
use tokio_util::sync::CancellationToken;

use super::context::RequestContext;
use super::pending::Outcome;
use super::Shared;
use crate::error::Error;
use crate::protocol::json_rpc::JSONRPCErrorInfo;
use crate::protocol::messages::{self, methods, CancelledParams};
use crate::protocol::{
    JSONRPCError, JSONRPCMessage, JSONRPCNotification, JSONRPCRequest, JSONRPCResponse, LoggingMessageParams,
    ProgressParams, RequestId,
};

impl Shared {
    /// Route one inbound frame
    pub(crate) async fn dispatch(self: &Arc<Self>, message: JSONRPCMessage) {
        match message {
            JSONRPCMessage::Request(request) => self.accept_request(request).await,
            JSONRPCMessage::Response(response) => {
                self.accept_answer(response.id, Outcome::Fulfilled(response.result)).await
            }
            JSONRPCMessage::Error(failure) => {
                let outcome = if failure.is_cancellation() {
                    Outcome::Cancelled
                } else {
                    Outcome::Failed(Error::from_error_info(failure.error))
                };
                self.accept_answer(failure.id, outcome).await
            }
            JSONRPCMessage::Notification(notification) => self.accept_notification(notification).await,
        }
    }

    async fn accept_answer(&self, id: RequestId, outcome: Outcome) {
        if let Err(e) = self.resolve(&id, outcome).await {
            self.violation(format!("response does not match a pending request: {}", e));
        }
    }

    async fn accept_request(self: &Arc<Self>, request: JSONRPCRequest) {
        let parent = messages::related_request_id(request.params.as_ref());
        let token = self.shutdown.child_token();

        if let Err(e) = self.executions.start(request.id.clone(), parent.clone(), token.clone()) {
            self.violation(format!("request reuses a running id: {}", e));
            return;
        }

        // A nested request whose parent already resolved is refused without running.
        if let Some(parent) = &parent {
            if !self.pending.adopt(parent, request.id.clone()) {
                debug!("Refusing {} nested under finished request {}", request.id, parent);
                self.executions.finish(&request.id);
                let refusal = Error::Cancelled(format!("request {} is no longer pending", parent));
                self.reply(&request.id, Err(refusal)).await;
                return;
            }
        }

        let shared = self.clone();
        tokio::spawn(async move { shared.execute(request, parent, token).await });
    }

    async fn execute(self: Arc<Self>, request: JSONRPCRequest, parent: Option<RequestId>, token: CancellationToken) {
        let JSONRPCRequest { id, method, params, .. } = request;

        // Cancelled between accept and the first poll of this task
        if token.is_cancelled() {
            debug!("Execution {} was cancelled before it started", id);
            self.finish_execution(&id).await;
            return;
        }
        debug!("Executing {} ({})", id, method);

        let ctx = RequestContext::new(
            self.clone(),
            id.clone(),
            parent,
            messages::progress_token(params.as_ref()),
            token.clone(),
        );
        let handler = self.handler.clone();
        let result = AssertUnwindSafe(handler.handle_request(ctx, &method, params))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::InternalError(panic_message(panic))));

        self.finish_execution(&id).await;

        if token.is_cancelled() {
            debug!("Execution {} was cancelled, no response sent", id);
            return;
        }
        self.reply(&id, result).await;
    }

    async fn reply(&self, id: &RequestId, result: crate::error::Result<serde_json::Value>) {
        let message = match result {
            Ok(value) => JSONRPCMessage::Response(JSONRPCResponse::new(id.clone(), value)),
            Err(e) => {
                let info: JSONRPCErrorInfo = e.to_error_info();
                JSONRPCMessage::Error(JSONRPCError::from_info(id.clone(), info))
            }
        };
        if let Err(e) = self.send(message).await {
            error!("Failed to send response for {}: {}", id, e);
        }
    }

    async fn accept_notification(&self, notification: JSONRPCNotification) {
        match notification.method.as_str() {
            methods::CANCELLED => match decode::<CancelledParams>(&notification) {
                Ok(params) => self.route_cancellation(params.request_id, params.reason).await,
                Err(e) => self.violation(e.to_string()),
            },
            methods::PROGRESS => match decode::<ProgressParams>(&notification) {
                Ok(params) => self.accept_progress(params),
                Err(e) => self.violation(e.to_string()),
            },
            methods::MESSAGE => match decode::<LoggingMessageParams>(&notification) {
                Ok(params) => {
                    let scope = messages::related_request_id(notification.params.as_ref());
                    self.accept_log(scope, params)
                }
                Err(e) => self.violation(e.to_string()),
            },
            _ => {
                if let Err(e) = self.handler.handle_notification(notification).await {
                    error!("Notification handler failed: {}", e);
                }
            }
        }
    }

    fn accept_progress(&self, params: ProgressParams) {
        let scope = RequestId::from(params.progress_token.clone());
        if !self.pending.is_live(&scope) {
            debug!("Dropping progress for settled request {}", scope);
            return;
        }
        if let Some(observer) = self.pending.progress_observer(&scope) {
            observer(&params);
        }
        self.handler.handle_progress(&scope, &params);
    }

    fn accept_log(&self, scope: Option<RequestId>, params: LoggingMessageParams) {
        if let Some(id) = &scope {
            if !self.pending.is_live(id) {
                debug!("Dropping log line for settled request {}", id);
                return;
            }
        }
        self.handler.handle_log(scope.as_ref(), &params);
    }
}

fn decode<T: serde::de::DeserializeOwned>(notification: &JSONRPCNotification) -> crate::error::Result<T> {
    let params = notification.params.clone().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(params)
        .map_err(|e| Error::ProtocolViolation(format!("malformed {} params: {}", notification.method, e)))
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", message)
    } else {
        "handler panicked".to_string()
    }
}
