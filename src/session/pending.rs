//! Table of outbound requests awaiting a response

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::protocol::{ProgressParams, RequestId};

/// Callback receiving progress notifications scoped to one outbound request
pub type ProgressObserver = Arc<dyn Fn(&ProgressParams) + Send + Sync>;

/// Terminal outcome of a correlated request
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The peer answered with a result
    Fulfilled(Value),
    /// The peer answered with an error, or the request could not complete
    Failed(Error),
    /// Either side cancelled the request
    Cancelled,
}

impl Outcome {
    /// Turn the outcome into a result; `Cancelled` becomes `Error::Cancelled`
    pub fn into_result(self) -> Result<Value> {
        match self {
            Outcome::Fulfilled(value) => Ok(value),
            Outcome::Failed(err) => Err(err),
            Outcome::Cancelled => Err(Error::Cancelled("request cancelled".to_string())),
        }
    }

    /// Whether this is the cancelled outcome
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The table state this outcome moves a request into
    pub fn state(&self) -> PendingState {
        match self {
            Outcome::Fulfilled(_) => PendingState::Fulfilled,
            Outcome::Failed(_) => PendingState::Failed,
            Outcome::Cancelled => PendingState::Cancelled,
        }
    }
}

/// Result slot of a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    /// No outcome decided yet
    Unresolved,
    /// Resolving with a result
    Fulfilled,
    /// Resolving with a failure
    Failed,
    /// Resolving as cancelled
    Cancelled,
}

/// Snapshot of a pending request
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Request id
    pub id: RequestId,
    /// Method the request invoked
    pub method: String,
    /// When the request was registered
    pub issued_at: Instant,
    /// Current result slot
    pub state: PendingState,
    /// Local execution that issued this request as a nested call
    pub parent: Option<RequestId>,
    /// Peer requests currently running on our behalf, scoped to this one
    pub children: Vec<RequestId>,
}

struct Entry {
    method: String,
    issued_at: Instant,
    state: PendingState,
    parent: Option<RequestId>,
    children: HashSet<RequestId>,
    waiter: Option<oneshot::Sender<Outcome>>,
    observer: Option<ProgressObserver>,
}

/// Outbound requests keyed by id.
///
/// Resolution happens in two steps. `begin` claims the entry for exactly
/// one resolver and hands back the children that must be settled first;
/// `complete` then removes the entry and wakes the waiter.
#[derive(Default)]
pub struct PendingTable {
    entries: DashMap<RequestId, Entry>,
}

impl PendingTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request and return the receiver its outcome is delivered on
    pub fn register(
        &self,
        id: RequestId,
        method: impl Into<String>,
        parent: Option<RequestId>,
        observer: Option<ProgressObserver>,
    ) -> Result<oneshot::Receiver<Outcome>> {
        match self.entries.entry(id) {
            MapEntry::Occupied(occupied) => Err(Error::DuplicateId(occupied.key().clone())),
            MapEntry::Vacant(vacant) => {
                let (sender, receiver) = oneshot::channel();
                vacant.insert(Entry {
                    method: method.into(),
                    issued_at: Instant::now(),
                    state: PendingState::Unresolved,
                    parent,
                    children: HashSet::new(),
                    waiter: Some(sender),
                    observer,
                });
                Ok(receiver)
            }
        }
    }

    /// Snapshot a pending request
    pub fn lookup(&self, id: &RequestId) -> Option<PendingRequest> {
        self.entries.get(id).map(|entry| PendingRequest {
            id: id.clone(),
            method: entry.method.clone(),
            issued_at: entry.issued_at,
            state: entry.state,
            parent: entry.parent.clone(),
            children: entry.children.iter().cloned().collect(),
        })
    }

    /// Whether `id` is registered and still unresolved
    pub fn is_live(&self, id: &RequestId) -> bool {
        self.entries
            .get(id)
            .map(|entry| entry.state == PendingState::Unresolved)
            .unwrap_or(false)
    }

    /// Record a peer execution scoped to `id`. Fails once `id` stopped being live.
    pub fn adopt(&self, id: &RequestId, child: RequestId) -> bool {
        match self.entries.get_mut(id) {
            Some(mut entry) if entry.state == PendingState::Unresolved => {
                entry.children.insert(child);
                true
            }
            _ => false,
        }
    }

    /// Forget a child that finished on its own
    pub fn release(&self, id: &RequestId, child: &RequestId) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            entry.children.remove(child);
        }
    }

    /// Claim the entry for resolution and take its children.
    ///
    /// Fails with `UnknownId` when the entry is missing or already claimed.
    pub fn begin(&self, id: &RequestId, state: PendingState) -> Result<Vec<RequestId>> {
        match self.entries.get_mut(id) {
            Some(mut entry) if entry.state == PendingState::Unresolved => {
                entry.state = state;
                Ok(entry.children.drain().collect())
            }
            _ => Err(Error::UnknownId(id.clone())),
        }
    }

    /// Remove a claimed entry and deliver its outcome. Returns the entry's parent.
    pub fn complete(&self, id: &RequestId, outcome: Outcome) -> Result<Option<RequestId>> {
        let (_, mut entry) = self
            .entries
            .remove(id)
            .ok_or_else(|| Error::UnknownId(id.clone()))?;
        if let Some(waiter) = entry.waiter.take() {
            // The caller may have dropped its PendingCall; nothing to wake then.
            let _ = waiter.send(outcome);
        }
        Ok(entry.parent)
    }

    /// Progress observer of a live request
    pub fn progress_observer(&self, id: &RequestId) -> Option<ProgressObserver> {
        self.entries
            .get(id)
            .filter(|entry| entry.state == PendingState::Unresolved)
            .and_then(|entry| entry.observer.clone())
    }

    /// Ids of every registered request
    pub fn ids(&self) -> Vec<RequestId> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Fail every unresolved request with `error`. Returns how many were failed.
    pub fn fail_all(&self, error: &Error) -> usize {
        let mut failed = 0;
        for id in self.ids() {
            if self.begin(&id, PendingState::Failed).is_ok()
                && self.complete(&id, Outcome::Failed(error.clone())).is_ok()
            {
                failed += 1;
            }
        }
        failed
    }

    /// Number of registered requests
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no request is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PendingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTable").field("len", &self.entries.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> RequestId {
        RequestId::from(s)
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let table = PendingTable::new();
        let _rx = table.register(id("a-1"), "tools/call", None, None).unwrap();
        match table.register(id("a-1"), "tools/call", None, None) {
            Err(Error::DuplicateId(dup)) => assert_eq!(dup, id("a-1")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_once() {
        let table = PendingTable::new();
        let rx = table.register(id("a-1"), "ping", None, None).unwrap();

        assert!(table.begin(&id("a-1"), PendingState::Fulfilled).unwrap().is_empty());
        // A second resolver loses the claim.
        assert!(matches!(
            table.begin(&id("a-1"), PendingState::Cancelled),
            Err(Error::UnknownId(_))
        ));
        table.complete(&id("a-1"), Outcome::Fulfilled(json!({}))).unwrap();

        assert!(matches!(rx.await.unwrap(), Outcome::Fulfilled(_)));
        assert!(table.lookup(&id("a-1")).is_none());
        assert!(matches!(table.complete(&id("a-1"), Outcome::Cancelled), Err(Error::UnknownId(_))));
    }

    #[test]
    fn test_unknown_id_is_reported_not_panicking() {
        let table = PendingTable::new();
        assert!(matches!(table.begin(&id("nope"), PendingState::Fulfilled), Err(Error::UnknownId(_))));
        assert!(!table.is_live(&id("nope")));
        assert!(!table.adopt(&id("nope"), id("x")));
    }

    #[test]
    fn test_children_tracked_until_claimed() {
        let table = PendingTable::new();
        let _rx = table.register(id("a-1"), "tools/call", Some(id("b-7")), None).unwrap();
        assert!(table.adopt(&id("a-1"), id("b-1")));
        assert!(table.adopt(&id("a-1"), id("b-2")));
        table.release(&id("a-1"), &id("b-1"));

        let snapshot = table.lookup(&id("a-1")).unwrap();
        assert_eq!(snapshot.children, vec![id("b-2")]);
        assert_eq!(snapshot.parent, Some(id("b-7")));
        assert_eq!(snapshot.state, PendingState::Unresolved);

        let children = table.begin(&id("a-1"), PendingState::Cancelled).unwrap();
        assert_eq!(children, vec![id("b-2")]);
        // No new children once the entry is claimed.
        assert!(!table.adopt(&id("a-1"), id("b-3")));
        assert!(!table.is_live(&id("a-1")));
        assert_eq!(table.complete(&id("a-1"), Outcome::Cancelled).unwrap(), Some(id("b-7")));
    }

    #[tokio::test]
    async fn test_fail_all_wakes_every_waiter() {
        let table = PendingTable::new();
        let receivers: Vec<_> = (0..3)
            .map(|n| table.register(id(&format!("a-{n}")), "tools/call", None, None).unwrap())
            .collect();

        assert_eq!(table.fail_all(&Error::ChannelClosed("gone".to_string())), 3);
        assert!(table.is_empty());
        for rx in receivers {
            assert!(matches!(rx.await.unwrap(), Outcome::Failed(Error::ChannelClosed(_))));
        }
    }

    #[test]
    fn test_observer_only_while_live() {
        let table = PendingTable::new();
        let observer: ProgressObserver = Arc::new(|_| {});
        let _rx = table.register(id("a-1"), "tools/call", None, Some(observer)).unwrap();
        assert!(table.progress_observer(&id("a-1")).is_some());
        table.begin(&id("a-1"), PendingState::Fulfilled).unwrap();
        assert!(table.progress_observer(&id("a-1")).is_none());
    }
}
