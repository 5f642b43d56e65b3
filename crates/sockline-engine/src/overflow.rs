//! Registry of sessions under soft backpressure.
//!
//! Writer loops insert a session when its outbound queue grows past half
//! capacity and remove it when the queue drains or the session closes.
//! Membership is the whole signal; the engine never acts on it. Monitoring
//! or throttling code reads it.

use std::sync::Arc;

use dashmap::DashSet;
use metrics::gauge;
use sockline_core::ConnectionId;

use crate::metrics::SESSIONS_OVERFLOWING;

/// Concurrent set of overflowing connections, shared by every session that
/// was built with a clone of it.
#[derive(Clone, Debug, Default)]
pub struct OverflowRegistry {
    members: Arc<DashSet<ConnectionId>>,
}

impl OverflowRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns `true` if it was not already present.
    pub fn insert(&self, id: &ConnectionId) -> bool {
        let added = self.members.insert(id.clone());
        if added {
            gauge!(SESSIONS_OVERFLOWING).increment(1.0);
        }
        added
    }

    /// Remove a connection. Returns `true` if it was present.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        let removed = self.members.remove(id).is_some();
        if removed {
            gauge!(SESSIONS_OVERFLOWING).decrement(1.0);
        }
        removed
    }

    /// Whether a connection is currently overflowing.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains(id)
    }

    /// Number of overflowing connections.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no connection is overflowing.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Point-in-time copy of the members.
    pub fn snapshot(&self) -> Vec<ConnectionId> {
        self.members.iter().map(|id| id.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let registry = OverflowRegistry::new();
        let id = ConnectionId::new();
        assert!(registry.insert(&id));
        assert!(!registry.insert(&id));
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn clones_share_membership() {
        let registry = OverflowRegistry::new();
        let other = registry.clone();
        let id = ConnectionId::new();
        let _ = registry.insert(&id);
        assert!(other.contains(&id));
        assert_eq!(other.snapshot(), vec![id]);
    }

    #[test]
    fn independent_registries_do_not_share() {
        let a = OverflowRegistry::new();
        let b = OverflowRegistry::new();
        let id = ConnectionId::new();
        let _ = a.insert(&id);
        assert!(!b.contains(&id));
    }

    #[test]
    fn concurrent_writers() {
        let registry = OverflowRegistry::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let id = ConnectionId::new();
                        let _ = registry.insert(&id);
                        let _ = registry.remove(&id);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
