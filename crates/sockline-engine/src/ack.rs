//! Correlation of outbound ack requests with inbound ack responses.
//!
//! Each pending request owns a `oneshot` sender keyed by its correlation id.
//! Three parties touch the table: the caller registers, the reader resolves
//! on a matching reply, and the caller's deadline cancels. All three go
//! through one lock, and removal from the table is the point that decides
//! which resolution wins. The loser finds the id gone and does nothing.

use std::collections::HashMap;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::AckError;
use crate::metrics::ACK_TIMEOUTS_TOTAL;

#[derive(Debug)]
struct AckTable {
    next_id: u64,
    pending: HashMap<u64, oneshot::Sender<Value>>,
}

/// Per-session table of pending ack waiters.
#[derive(Debug)]
pub struct AckCorrelator {
    table: Mutex<AckTable>,
}

impl AckCorrelator {
    /// An empty table. Ids start at 1.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(AckTable {
                next_id: 1,
                pending: HashMap::new(),
            }),
        }
    }

    /// Allocate an id not currently pending and register a waiter for it.
    pub fn register(&self) -> (u64, oneshot::Receiver<Value>) {
        let mut table = self.table.lock();
        let mut id = table.next_id;
        while table.pending.contains_key(&id) {
            id = id.wrapping_add(1);
        }
        table.next_id = id.wrapping_add(1);
        let (tx, rx) = oneshot::channel();
        let _ = table.pending.insert(id, tx);
        (id, rx)
    }

    /// Deliver a reply. Returns `false` if no waiter is pending for `id`
    /// (unknown, already resolved, or timed out).
    pub fn resolve(&self, id: u64, payload: Value) -> bool {
        let waiter = self.table.lock().pending.remove(&id);
        match waiter {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Drop the waiter for `id`. Returns `true` if it was still pending.
    pub fn cancel(&self, id: u64) -> bool {
        self.table.lock().pending.remove(&id).is_some()
    }

    /// Drop every waiter; their callers see [`AckError::SessionClosed`].
    pub fn cancel_all(&self) -> usize {
        let mut table = self.table.lock();
        let count = table.pending.len();
        table.pending.clear();
        count
    }

    /// Whether a waiter for `id` is pending.
    pub fn is_pending(&self, id: u64) -> bool {
        self.table.lock().pending.contains_key(&id)
    }

    /// Number of pending waiters.
    pub fn pending_count(&self) -> usize {
        self.table.lock().pending.len()
    }

    /// Wait for the reply to `id`, or time out after `deadline`.
    ///
    /// Dropping the returned future before it completes removes the waiter.
    pub async fn wait(
        &self,
        id: u64,
        mut rx: oneshot::Receiver<Value>,
        deadline: Duration,
    ) -> Result<Value, AckError> {
        let mut guard = WaiterGuard {
            acks: self,
            id,
            armed: true,
        };
        let result = match tokio::time::timeout(deadline, &mut rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(AckError::SessionClosed),
            Err(_) => {
                if self.cancel(id) {
                    counter!(ACK_TIMEOUTS_TOTAL).increment(1);
                    debug!(ack_id = id, ?deadline, "ack timed out");
                    Err(AckError::Timeout { deadline })
                } else {
                    // The reply took the waiter out of the table just before
                    // the deadline fired.
                    rx.try_recv().map_err(|_| AckError::SessionClosed)
                }
            }
        };
        guard.armed = false;
        result
    }
}

/// Removes a waiter whose caller stopped polling before it resolved.
struct WaiterGuard<'a> {
    acks: &'a AckCorrelator,
    id: u64,
    armed: bool,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.acks.cancel(self.id) {
            debug!(ack_id = self.id, "ack waiter dropped by caller");
        }
    }
}

impl Default for AckCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn ids_are_sequential_and_unique() {
        let acks = AckCorrelator::new();
        let (a, _ra) = acks.register();
        let (b, _rb) = acks.register();
        assert_eq!((a, b), (1, 2));
        assert_eq!(acks.pending_count(), 2);
    }

    #[test]
    fn allocation_skips_pending_ids() {
        let acks = AckCorrelator::new();
        let (first, _rx) = acks.register();
        acks.table.lock().next_id = first;
        let (second, _rx2) = acks.register();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn resolve_delivers_payload() {
        let acks = AckCorrelator::new();
        let (id, rx) = acks.register();
        assert!(acks.resolve(id, json!("pong")));
        assert!(!acks.is_pending(id));
        assert_eq!(rx.await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn second_resolution_is_a_no_op() {
        let acks = AckCorrelator::new();
        let (id, rx) = acks.register();
        assert!(acks.resolve(id, json!("first")));
        assert!(!acks.resolve(id, json!("second")));
        assert_eq!(rx.await.unwrap(), json!("first"));
    }

    #[test]
    fn unknown_id_is_ignored() {
        let acks = AckCorrelator::new();
        assert!(!acks.resolve(99, json!(null)));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_waiter() {
        let acks = AckCorrelator::new();
        let (id, rx) = acks.register();
        let started = tokio::time::Instant::now();
        let result = acks.wait(id, rx, Duration::from_secs(5)).await;
        assert_matches!(result, Err(AckError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(!acks.is_pending(id));
        // Late reply after timeout is dropped.
        assert!(!acks.resolve(id, json!("late")));
    }

    #[tokio::test(start_paused = true)]
    async fn reply_before_deadline_wins() {
        let acks = Arc::new(AckCorrelator::new());
        let (id, rx) = acks.register();
        let resolver = {
            let acks = acks.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                acks.resolve(id, json!({"ok": true}))
            })
        };
        let result = acks.wait(id, rx, Duration::from_secs(5)).await;
        assert_eq!(result.unwrap(), json!({"ok": true}));
        assert!(resolver.await.unwrap());
    }

    #[tokio::test]
    async fn reply_that_beat_the_deadline_is_still_delivered() {
        let acks = AckCorrelator::new();
        let (id, rx) = acks.register();
        assert!(acks.resolve(id, json!(1)));
        let result = acks.wait(id, rx, Duration::ZERO).await;
        assert_eq!(result.unwrap(), json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_wait_removes_waiter() {
        let acks = AckCorrelator::new();
        for _ in 0..10 {
            let (id, rx) = acks.register();
            let outer =
                tokio::time::timeout(Duration::from_millis(10), acks.wait(id, rx, Duration::from_secs(5)))
                    .await;
            assert!(outer.is_err());
        }
        assert_eq!(acks.pending_count(), 0);
    }

    #[tokio::test]
    async fn cancel_all_reports_session_closed() {
        let acks = AckCorrelator::new();
        let (a, ra) = acks.register();
        let (b, rb) = acks.register();
        assert_eq!(acks.cancel_all(), 2);
        assert_matches!(
            acks.wait(a, ra, Duration::from_secs(1)).await,
            Err(AckError::SessionClosed)
        );
        assert_matches!(
            acks.wait(b, rb, Duration::from_secs(1)).await,
            Err(AckError::SessionClosed)
        );
    }
}
