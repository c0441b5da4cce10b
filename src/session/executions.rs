//! Table of inbound requests currently executing locally

use std::collections::HashSet;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::RequestId;

struct Execution {
    token: CancellationToken,
    parent: Option<RequestId>,
    children: HashSet<RequestId>,
    cancelled: bool,
}

/// Running executions keyed by the peer's request id
#[derive(Default)]
pub struct ExecutionTable {
    entries: DashMap<RequestId, Execution>,
}

impl ExecutionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new execution observed through `token`
    pub fn start(&self, id: RequestId, parent: Option<RequestId>, token: CancellationToken) -> Result<()> {
        match self.entries.entry(id) {
            MapEntry::Occupied(occupied) => Err(Error::DuplicateId(occupied.key().clone())),
            MapEntry::Vacant(vacant) => {
                vacant.insert(Execution {
                    token,
                    parent,
                    children: HashSet::new(),
                    cancelled: false,
                });
                Ok(())
            }
        }
    }

    /// Record an outbound nested request issued by execution `id`.
    ///
    /// Fails once the execution was cancelled or finished.
    pub fn adopt(&self, id: &RequestId, child: RequestId) -> bool {
        match self.entries.get_mut(id) {
            Some(mut execution) if !execution.cancelled => {
                execution.children.insert(child);
                true
            }
            _ => false,
        }
    }

    /// Forget a nested request that resolved on its own
    pub fn release(&self, id: &RequestId, child: &RequestId) {
        if let Some(mut execution) = self.entries.get_mut(id) {
            execution.children.remove(child);
        }
    }

    /// Cancel an execution's token and take its outstanding nested requests.
    ///
    /// Returns `None` when no such execution is running.
    pub fn signal(&self, id: &RequestId) -> Option<Vec<RequestId>> {
        let mut execution = self.entries.get_mut(id)?;
        execution.cancelled = true;
        execution.token.cancel();
        Some(execution.children.drain().collect())
    }

    /// Remove a finished execution, returning its parent and its outstanding nested requests
    pub fn finish(&self, id: &RequestId) -> Option<(Option<RequestId>, Vec<RequestId>)> {
        self.entries
            .remove(id)
            .map(|(_, execution)| (execution.parent, execution.children.into_iter().collect()))
    }

    /// Whether `id` is running and not cancelled
    pub fn is_running(&self, id: &RequestId) -> bool {
        self.entries
            .get(id)
            .map(|execution| !execution.cancelled)
            .unwrap_or(false)
    }

    /// Cancel every execution and empty the table
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<RequestId> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut cancelled = 0;
        for id in ids {
            if let Some((_, execution)) = self.entries.remove(&id) {
                execution.token.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Number of running executions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is running
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
