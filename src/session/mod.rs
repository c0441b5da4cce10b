//! Bidirectional correlated-request engine
//!
//! A [`Session`] owns one connection. Either side may issue requests at any
//! time; requests issued while executing a peer request are nested under it,
//! so cancelling or resolving the parent settles the nested ones first.
//!
//! The pieces:
//! - [`IdAllocator`] hands out request ids
//! - [`PendingTable`] tracks our outbound requests until the peer answers
//! - [`ExecutionTable`] tracks peer requests we are executing
//! - the dispatcher classifies inbound frames and routes them
//! - the cancellation controller propagates cancels across the connection
//! - [`RequestContext`] is the per-execution handle given to a [`RequestHandler`]

mod cancellation;
mod context;
mod dispatcher;
mod executions;
mod ids;
mod pending;

pub use context::RequestContext;
pub use executions::ExecutionTable;
pub use ids::IdAllocator;
pub use pending::{Outcome, PendingRequest, PendingState, PendingTable, ProgressObserver};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use derive_builder::Builder;
use log::{debug, error, warn};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::messages::{self, methods, CancelledParams};
use crate::protocol::{
    JSONRPCMessage, JSONRPCNotification, JSONRPCRequest, LoggingMessageParams, ProgressParams, ProgressToken,
    RequestId,
};
use crate::transport::Transport;

/// Session configuration
#[derive(Debug, Clone, Builder)]
#[builder(default, setter(into))]
pub struct SessionOptions {
    /// Default bound on every outbound request in milliseconds (0 = no timeout)
    pub default_timeout_ms: u64,
    /// Capacity of the session event channel
    pub event_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_timeout_ms: 0,
            event_capacity: 100,
        }
    }
}

impl SessionOptions {
    /// Start building options
    pub fn builder() -> SessionOptionsBuilder {
        SessionOptionsBuilder::default()
    }
}

/// Something the session wants its owner to know about
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The peer sent a frame that was dropped
    ProtocolViolation {
        /// What was wrong with it
        detail: String,
    },
    /// The session ended; every pending request has been resolved
    Closed {
        /// Why the session ended
        reason: String,
    },
}

/// Local side of a session: executes the requests the peer sends us
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Execute one peer request. Runs on its own task.
    async fn handle_request(&self, ctx: RequestContext, method: &str, params: Option<Value>) -> Result<Value>;

    /// Progress reported by the peer for one of our live requests
    fn handle_progress(&self, _scope: &RequestId, _params: &ProgressParams) {}

    /// Log line from the peer, scoped to one of our live requests or unscoped
    fn handle_log(&self, _scope: Option<&RequestId>, _params: &LoggingMessageParams) {}

    /// Any other notification
    async fn handle_notification(&self, notification: JSONRPCNotification) -> Result<()> {
        debug!("Ignoring notification {}", notification.method);
        Ok(())
    }
}

/// A request about to be issued
pub struct OutboundRequest {
    method: String,
    params: Option<Value>,
    timeout_ms: Option<u64>,
    observer: Option<ProgressObserver>,
    scope: Option<(RequestId, CancellationToken)>,
}

impl OutboundRequest {
    /// Create a request
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            timeout_ms: None,
            observer: None,
            scope: None,
        }
    }

    /// Override the session's default timeout (0 = no timeout)
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Observe progress the peer reports for this request
    pub fn with_progress_observer(mut self, observer: impl Fn(&ProgressParams) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub(crate) fn scoped(mut self, parent: RequestId, token: CancellationToken) -> Self {
        self.scope = Some((parent, token));
        self
    }

    /// Method name
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("params", &self.params)
            .field("timeout_ms", &self.timeout_ms)
            .field("scope", &self.scope.as_ref().map(|(parent, _)| parent))
            .finish()
    }
}

/// An issued request whose outcome has not been collected yet.
///
/// The timeout runs from the moment the request is issued, whether or not
/// anyone is awaiting the call.
pub struct PendingCall {
    id: RequestId,
    receiver: oneshot::Receiver<Outcome>,
    scope: Option<CancellationToken>,
    shared: Arc<Shared>,
}

impl PendingCall {
    /// Id the request was issued under; pass it to [`Session::cancel`] to cancel it
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Wait for the terminal outcome.
    ///
    /// A timeout fails the request with `PeerTimeout` and tells the peer to
    /// stop. If the request is nested and its parent gets cancelled, the
    /// request is cancelled too.
    pub async fn outcome(self) -> Outcome {
        let PendingCall {
            id,
            mut receiver,
            scope,
            shared,
        } = self;

        let scope_cancelled = async {
            match &scope {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            outcome = &mut receiver => return outcome.unwrap_or_else(|_| lost(&id)),
            _ = scope_cancelled => {
                shared
                    .cancel_outbound(id.clone(), Some("parent request cancelled".to_string()), true)
                    .await;
            }
        }

        // Whoever won the race has delivered the outcome by now.
        receiver.await.unwrap_or_else(|_| lost(&id))
    }

    /// Wait for the outcome as a result; `Cancelled` becomes `Error::Cancelled`
    pub async fn result(self) -> Result<Value> {
        self.outcome().await.into_result()
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("nested", &self.scope.is_some())
            .finish()
    }
}

fn lost(id: &RequestId) -> Outcome {
    Outcome::Failed(Error::InternalError(format!("outcome of request {} was lost", id)))
}

/// State shared by the session handle, the reader loop and every execution
pub(crate) struct Shared {
    ids: IdAllocator,
    pending: PendingTable,
    executions: ExecutionTable,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn RequestHandler>,
    events: mpsc::Sender<SessionEvent>,
    options: SessionOptions,
    closing: AtomicBool,
    /// Cancelled when the session starts shutting down; parent of every execution token
    shutdown: CancellationToken,
    /// Cancelled once shutdown finished
    closed: CancellationToken,
}

impl Shared {
    pub(crate) async fn send(&self, message: JSONRPCMessage) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ChannelClosed("session is closed".to_string()));
        }
        self.transport.send(message).await
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.events.try_send(event) {
            warn!("Session event channel full, dropping {:?}", event);
        }
    }

    pub(crate) fn violation(&self, detail: String) {
        warn!("Protocol violation: {}", detail);
        self.emit(SessionEvent::ProtocolViolation { detail });
    }

    pub(crate) async fn send_cancelled(&self, id: RequestId, reason: Option<String>) {
        let params = CancelledParams { request_id: id, reason };
        let notification = match serde_json::to_value(&params) {
            Ok(params) => JSONRPCNotification::new(methods::CANCELLED, Some(params)),
            Err(e) => {
                error!("Failed to encode cancellation: {}", e);
                return;
            }
        };
        if let Err(e) = self.send(JSONRPCMessage::Notification(notification)).await {
            debug!("Cancellation for {} not delivered: {}", params.request_id, e);
        }
    }

    /// Register and send an outbound request
    pub(crate) async fn issue(self: &Arc<Self>, request: OutboundRequest) -> Result<PendingCall> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ChannelClosed("session is closed".to_string()));
        }

        let OutboundRequest {
            method,
            mut params,
            timeout_ms,
            observer,
            scope,
        } = request;
        let id = self.ids.allocate();
        let (parent, scope) = match scope {
            Some((parent, token)) => (Some(parent), Some(token)),
            None => (None, None),
        };

        match &parent {
            Some(parent) => messages::set_related_request_id(&mut params, parent),
            None => messages::set_progress_token(&mut params, &ProgressToken::from(id.clone())),
        }

        let receiver = self.pending.register(id.clone(), method.clone(), parent, observer)?;

        // Shutdown may have drained the table between the check above and the register.
        if self.shutdown.is_cancelled() {
            self.settle(&id, Outcome::Failed(Error::ChannelClosed("session is closed".to_string())))
                .await;
            return Err(Error::ChannelClosed("session is closed".to_string()));
        }

        debug!("Issuing {} as {}", method, id);
        let message = JSONRPCMessage::Request(JSONRPCRequest::new(id.clone(), method, params));
        if let Err(e) = self.send(message).await {
            self.settle(&id, Outcome::Failed(e.clone())).await;
            return Err(e);
        }

        let timeout_ms = timeout_ms.unwrap_or(self.options.default_timeout_ms);
        if timeout_ms > 0 {
            self.arm_deadline(id.clone(), Duration::from_millis(timeout_ms));
        }
        Ok(PendingCall {
            id,
            receiver,
            scope,
            shared: self.clone(),
        })
    }

    /// Stop the session: cancel every execution, fail every pending request.
    pub(crate) async fn shutdown(&self, reason: String) {
        if self.closing.swap(true, Ordering::SeqCst) {
            self.closed.cancelled().await;
            return;
        }

        debug!("Session {} shutting down: {}", self.ids.prefix(), reason);
        self.shutdown.cancel();
        let cancelled = self.executions.cancel_all();
        let failed = self.pending.fail_all(&Error::ChannelClosed(reason.clone()));
        debug!("Cancelled {} executions, failed {} pending requests", cancelled, failed);

        if let Err(e) = self.transport.disconnect().await {
            debug!("Transport disconnect failed: {}", e);
        }
        self.closed.cancel();
        self.emit(SessionEvent::Closed { reason });
    }
}

async fn run(shared: Arc<Shared>) {
    debug!("Starting message processing loop");
    let reason = loop {
        let next = tokio::select! {
            _ = shared.shutdown.cancelled() => break "session closed".to_string(),
            next = shared.transport.receive() => next,
        };

        match next {
            Some(Ok(message)) => shared.dispatch(message).await,
            Some(Err(Error::ParseError(detail))) | Some(Err(Error::JsonError(detail))) => {
                shared.violation(format!("malformed frame: {}", detail));
            }
            Some(Err(Error::ProtocolViolation(detail))) => {
                shared.violation(detail.clone());
                break detail;
            }
            Some(Err(e)) => {
                error!("Error receiving message: {}", e);
                break e.to_string();
            }
            None => break "transport closed".to_string(),
        }
    };

    debug!("Message processing loop ended");
    shared.shutdown(reason).await;
}

/// One logical session over one connection
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Connect the transport and start processing inbound frames.
    ///
    /// Returns the session handle and the receiver of session events.
    pub async fn open(
        transport: Arc<dyn Transport>,
        handler: Arc<dyn RequestHandler>,
        options: SessionOptions,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>)> {
        transport.connect().await?;

        let (events, event_receiver) = mpsc::channel(options.event_capacity.max(1));
        let shared = Arc::new(Shared {
            ids: IdAllocator::new(),
            pending: PendingTable::new(),
            executions: ExecutionTable::new(),
            transport,
            handler,
            events,
            options,
            closing: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            closed: CancellationToken::new(),
        });

        tokio::spawn(run(shared.clone()));
        Ok((Self { shared }, event_receiver))
    }

    /// Prefix of every request id this session issues
    pub fn id(&self) -> &str {
        self.shared.ids.prefix()
    }

    /// Issue a request; the returned call resolves to its outcome
    pub async fn send_request(&self, request: OutboundRequest) -> Result<PendingCall> {
        self.shared.issue(request).await
    }

    /// Issue a request and wait for its result
    pub async fn request(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        self.send_request(OutboundRequest::new(method, params)).await?.result().await
    }

    /// Send a notification
    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<()> {
        let notification = JSONRPCNotification::new(method, params);
        self.shared.send(JSONRPCMessage::Notification(notification)).await
    }

    /// Cancel one of our pending requests.
    ///
    /// The caller observes `Outcome::Cancelled` immediately; the peer is told
    /// to stop. Fails with `UnknownId` if the request already resolved.
    pub async fn cancel(&self, id: &RequestId, reason: Option<String>) -> Result<()> {
        if self.shared.cancel_outbound(id.clone(), reason, true).await {
            Ok(())
        } else {
            Err(Error::UnknownId(id.clone()))
        }
    }

    /// Snapshot of a pending request
    pub fn lookup(&self, id: &RequestId) -> Option<PendingRequest> {
        self.shared.pending.lookup(id)
    }

    /// Number of our requests awaiting a response
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Number of peer requests currently executing locally
    pub fn running_count(&self) -> usize {
        self.shared.executions.len()
    }

    /// Close the session. Pending requests fail with `ChannelClosed`.
    pub async fn close(&self) {
        self.shared.shutdown("closed by local side".to_string()).await;
    }

    /// Whether the session has ended
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Resolves once the session has ended
    pub async fn closed(&self) {
        self.shared.closed.cancelled().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("pending", &self.pending_count())
            .field("running", &self.running_count())
            .finish()
    }
}
