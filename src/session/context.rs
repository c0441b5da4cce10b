//! Per-execution handle

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{OutboundRequest, PendingCall, Session, Shared};
use crate::error::{Error, Result};
use crate::protocol::messages::{self, methods};
use crate::protocol::{
    JSONRPCMessage, JSONRPCNotification, LoggingMessageParams, ProgressParams, ProgressToken, RequestId,
};

/// Handle given to a [`RequestHandler`](super::RequestHandler) for one peer request.
///
/// Everything sent through the context is scoped to that request: nested
/// requests carry it as their parent, notifications reference it. Once the
/// request is cancelled the context emits nothing further.
#[derive(Clone)]
pub struct RequestContext {
    shared: Arc<Shared>,
    request_id: RequestId,
    related_request_id: Option<RequestId>,
    progress_token: Option<ProgressToken>,
    token: CancellationToken,
}

impl RequestContext {
    pub(crate) fn new(
        shared: Arc<Shared>,
        request_id: RequestId,
        related_request_id: Option<RequestId>,
        progress_token: Option<ProgressToken>,
        token: CancellationToken,
    ) -> Self {
        Self {
            shared,
            request_id,
            related_request_id,
            progress_token,
            token,
        }
    }

    /// Id of the request being executed
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Our own request this one is nested under, if any
    pub fn related_request_id(&self) -> Option<&RequestId> {
        self.related_request_id.as_ref()
    }

    /// Token the requester attached for progress reports
    pub fn progress_token(&self) -> Option<&ProgressToken> {
        self.progress_token.as_ref()
    }

    /// The session this execution runs in
    pub fn session(&self) -> Session {
        Session {
            shared: self.shared.clone(),
        }
    }

    /// Whether the request has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the request is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Cancellation checkpoint: `Err(Cancelled)` once the request is cancelled
    pub fn checkpoint(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(Error::Cancelled(format!("request {} cancelled", self.request_id)))
        } else {
            Ok(())
        }
    }

    /// Issue a request nested under this one
    pub async fn send_request(&self, request: OutboundRequest) -> Result<PendingCall> {
        self.checkpoint()?;
        let call = self
            .shared
            .issue(request.scoped(self.request_id.clone(), self.token.clone()))
            .await?;

        // The execution may have been cancelled while the request was on its way out.
        if !self.shared.executions.adopt(&self.request_id, call.id().clone()) {
            self.shared
                .cancel_outbound(call.id().clone(), Some("parent request cancelled".to_string()), true)
                .await;
            return Err(Error::Cancelled(format!("request {} cancelled", self.request_id)));
        }
        Ok(call)
    }

    /// Issue a nested request and wait for its result
    pub async fn request(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        self.send_request(OutboundRequest::new(method, params))
            .await?
            .result()
            .await
    }

    /// Send a notification scoped to this request. Dropped once cancelled.
    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }
        let mut params = params;
        messages::set_related_request_id(&mut params, &self.request_id);
        self.shared
            .send(JSONRPCMessage::Notification(JSONRPCNotification::new(method, params)))
            .await
    }

    /// Report progress to the requester.
    ///
    /// A no-op when the requester attached no progress token or the request
    /// was cancelled.
    pub async fn report_progress(&self, progress: f64, total: Option<f64>, message: Option<String>) -> Result<()> {
        let Some(token) = &self.progress_token else {
            debug!("No progress token on {}, progress not reported", self.request_id);
            return Ok(());
        };
        if self.is_cancelled() {
            return Ok(());
        }
        let params = ProgressParams {
            progress_token: token.clone(),
            progress,
            total,
            message,
        };
        let notification = JSONRPCNotification::new(methods::PROGRESS, Some(serde_json::to_value(params)?));
        self.shared.send(JSONRPCMessage::Notification(notification)).await
    }

    /// Send a log line scoped to this request. Dropped once cancelled.
    pub async fn log(&self, params: LoggingMessageParams) -> Result<()> {
        self.notify(methods::MESSAGE, Some(serde_json::to_value(params)?)).await
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("related_request_id", &self.related_request_id)
            .field("progress_token", &self.progress_token)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
