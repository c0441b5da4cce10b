//! Cancellation controller
//!
//! Cancels travel in two directions. Cancelling one of our outbound requests
//! abandons every peer execution running on its behalf; cancelling one of
//! our executions cancels every outbound request it issued. Children always
//! reach a terminal state before the parent's outcome becomes observable.

use std::sync::Arc;
use std::time::Duration;

use async_recursion::async_recursion;
use log::debug;

use super::pending::{Outcome, PendingState};
use super::Shared;
use crate::error::{Error, Result};
use crate::protocol::RequestId;

impl Shared {
    /// Cancel one of our outbound requests.
    ///
    /// Returns false when the request is unknown or already resolving.
    #[async_recursion]
    pub(crate) async fn cancel_outbound(&self, id: RequestId, reason: Option<String>, notify_peer: bool) -> bool {
        let children = match self.pending.begin(&id, PendingState::Cancelled) {
            Ok(children) => children,
            Err(_) => return false,
        };
        debug!("Cancelling request {} ({} nested)", id, children.len());

        for child in children {
            self.cancel_inbound(child).await;
        }
        self.settle_claimed(&id, Outcome::Cancelled);

        if notify_peer {
            self.send_cancelled(id, reason).await;
        }
        true
    }

    /// Signal one of our executions to stop, then cancel the requests it issued.
    ///
    /// Returns false when no such execution is running.
    #[async_recursion]
    pub(crate) async fn cancel_inbound(&self, id: RequestId) -> bool {
        let children = match self.executions.signal(&id) {
            Some(children) => children,
            None => return false,
        };
        debug!("Signalled execution {} ({} nested)", id, children.len());

        for child in children {
            self.cancel_outbound(child, Some("parent request cancelled".to_string()), true)
                .await;
        }
        true
    }

    /// Resolve one of our requests with the peer's answer.
    ///
    /// Peer executions still running on its behalf are abandoned first.
    pub(crate) async fn resolve(&self, id: &RequestId, outcome: Outcome) -> Result<()> {
        let children = self.pending.begin(id, outcome.state())?;
        for child in children {
            self.cancel_inbound(child).await;
        }
        self.settle_claimed(id, outcome);
        Ok(())
    }

    /// Resolve a request locally, whatever state its peer is in
    pub(crate) async fn settle(&self, id: &RequestId, outcome: Outcome) -> bool {
        self.resolve(id, outcome).await.is_ok()
    }

    /// Fail a request that ran out of time and ask the peer to stop it.
    ///
    /// Returns false when an answer won the race.
    pub(crate) async fn expire(&self, id: &RequestId, timeout: Duration) -> bool {
        let error = Error::PeerTimeout(format!("no response after {} ms", timeout.as_millis()));
        if !self.settle(id, Outcome::Failed(error)).await {
            return false;
        }
        debug!("Request {} timed out", id);
        self.send_cancelled(id.clone(), Some("timed out".to_string())).await;
        true
    }

    /// Expire `id` after `timeout` unless an answer or shutdown comes first
    pub(crate) fn arm_deadline(self: &Arc<Self>, id: RequestId, timeout: Duration) {
        let shared = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if let Some(shared) = shared.upgrade() {
                        shared.expire(&id, timeout).await;
                    }
                }
            }
        });
    }

    /// Retire a finished execution and cancel whatever it left outstanding
    pub(crate) async fn finish_execution(&self, id: &RequestId) {
        let Some((parent, children)) = self.executions.finish(id) else {
            return;
        };
        if let Some(parent) = parent {
            self.pending.release(&parent, id);
        }
        for child in children {
            self.cancel_outbound(child, Some("parent request completed".to_string()), true)
                .await;
        }
    }

    /// Route a cancellation sent by the peer.
    ///
    /// Ids of the two sides never collide, so the target is either one of
    /// our executions (the peer cancelling its own request) or one of our
    /// pending requests (the peer refusing to finish it).
    pub(crate) async fn route_cancellation(&self, id: RequestId, reason: Option<String>) {
        let reason = reason.unwrap_or_else(|| "no reason given".to_string());
        if self.cancel_inbound(id.clone()).await {
            debug!("Peer cancelled request {}: {}", id, reason);
        } else if self.cancel_outbound(id.clone(), None, false).await {
            debug!("Peer rejected our request {}: {}", id, reason);
        } else {
            // Cancels race with responses; a late one is harmless.
            debug!("Ignoring cancellation for unknown request {}", id);
        }
    }

    fn settle_claimed(&self, id: &RequestId, outcome: Outcome) {
        if let Ok(Some(parent)) = self.pending.complete(id, outcome) {
            self.executions.release(&parent, id);
        }
    }
}
