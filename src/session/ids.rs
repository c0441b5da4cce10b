//! Request id allocation

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::protocol::RequestId;

/// Allocates request ids for one session.
///
/// Ids look like `<prefix>-<n>`, where the prefix is drawn from a fresh
/// UUID per session, so ids issued by the two ends of a connection never
/// collide.
#[derive(Debug)]
pub struct IdAllocator {
    prefix: String,
    next: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator with a random prefix
    pub fn new() -> Self {
        let mut prefix = Uuid::new_v4().simple().to_string();
        prefix.truncate(8);
        Self::with_prefix(prefix)
    }

    /// Create an allocator with a fixed prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    /// The session prefix shared by every id this allocator issues
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Allocate a fresh id
    pub fn allocate(&self) -> RequestId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        RequestId::String(format!("{}-{}", self.prefix, n))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_carry_prefix() {
        let ids = IdAllocator::with_prefix("abc");
        assert_eq!(ids.allocate(), RequestId::from("abc-1"));
        assert_eq!(ids.allocate(), RequestId::from("abc-2"));
    }

    #[test]
    fn test_sessions_do_not_share_prefixes() {
        let a = IdAllocator::new();
        let b = IdAllocator::new();
        assert_ne!(a.prefix(), b.prefix());
        assert_eq!(a.prefix().len(), 8);
    }

    #[tokio::test]
    async fn test_unique_under_concurrent_allocation() {
        let ids = Arc::new(IdAllocator::new());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let ids = ids.clone();
            tasks.push(tokio::spawn(async move {
                (0..500).map(|_| ids.allocate()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for task in tasks {
            for id in task.await.unwrap() {
                assert!(seen.insert(id), "duplicate id allocated");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
