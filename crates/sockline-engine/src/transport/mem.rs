//! In-process transport backed by unbounded channels.
//!
//! [`memory_pair`] returns the session side ([`MemoryTransport`]) and the
//! remote side ([`MemoryPeer`]). Used in tests and for in-process peers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use super::{PingParams, Transport, TransportError};

struct Shared {
    closed: CancellationToken,
    close_calls: AtomicUsize,
    fail_writes: AtomicBool,
    // While throttled, each write consumes one permit.
    throttled: AtomicBool,
    write_permits: Semaphore,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            closed: CancellationToken::new(),
            close_calls: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            throttled: AtomicBool::new(false),
            write_permits: Semaphore::new(0),
        }
    }
}

/// Session side of an in-memory connection.
pub struct MemoryTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
    outbound: mpsc::UnboundedSender<String>,
    ping: PingParams,
    shared: Arc<Shared>,
}

/// Remote side of an in-memory connection.
pub struct MemoryPeer {
    to_session: Option<mpsc::UnboundedSender<String>>,
    from_session: mpsc::UnboundedReceiver<String>,
    shared: Arc<Shared>,
}

/// Create a connected transport/peer pair.
pub fn memory_pair(ping: PingParams) -> (MemoryTransport, MemoryPeer) {
    let (to_session, inbound) = mpsc::unbounded_channel();
    let (outbound, from_session) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared::default());
    (
        MemoryTransport {
            inbound: Mutex::new(inbound),
            outbound,
            ping,
            shared: shared.clone(),
        },
        MemoryPeer {
            to_session: Some(to_session),
            from_session,
            shared,
        },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn receive(&self) -> Result<String, TransportError> {
        if self.shared.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            () = self.shared.closed.cancelled() => Err(TransportError::Closed),
            frame = inbound.recv() => frame.ok_or(TransportError::Closed),
        }
    }

    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        if self.shared.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        if self.shared.fail_writes.load(Ordering::Acquire) {
            return Err(TransportError::Io("injected write failure".into()));
        }
        if self.shared.throttled.load(Ordering::Acquire) {
            tokio::select! {
                () = self.shared.closed.cancelled() => return Err(TransportError::Closed),
                permit = self.shared.write_permits.acquire() => match permit {
                    Ok(permit) => permit.forget(),
                    Err(_) => return Err(TransportError::Closed),
                },
            }
        }
        self.outbound
            .send(frame.to_owned())
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        let _ = self.shared.close_calls.fetch_add(1, Ordering::AcqRel);
        self.shared.closed.cancel();
    }

    fn ping_params(&self) -> PingParams {
        self.ping
    }
}

impl MemoryPeer {
    /// Deliver a frame to the session. Returns `false` once the peer hung up.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        self.to_session
            .as_ref()
            .is_some_and(|tx| tx.send(frame.into()).is_ok())
    }

    /// Simulate the remote end going away: the session's next read fails.
    pub fn hang_up(&mut self) {
        self.to_session = None;
    }

    /// Make every later session write fail with an I/O error.
    pub fn fail_writes(&self) {
        self.shared.fail_writes.store(true, Ordering::Release);
    }

    /// Hold every later session write until [`MemoryPeer::release_writes`]
    /// lets it through, as a peer that stopped reading would.
    pub fn throttle_writes(&self) {
        self.shared.throttled.store(true, Ordering::Release);
    }

    /// Let `n` held writes complete.
    pub fn release_writes(&self, n: usize) {
        self.shared.write_permits.add_permits(n);
    }

    /// Next frame written by the session.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_session.recv().await
    }

    /// Next already-written frame, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_session.try_recv().ok()
    }

    /// Every frame written so far.
    pub fn drain(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Whether the session closed its transport.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// How many times the session called [`Transport::close`].
    pub fn close_count(&self) -> usize {
        self.shared.close_calls.load(Ordering::Acquire)
    }
}
