//! One client connection: transport, outbound queue, header, liveness and
//! ack table, plus the single teardown transition.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use serde_json::Value;
use sockline_core::protocol::{encode_ack_request, encode_ack_response, encode_emit};
use sockline_core::{ConnectionId, Handshake};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ack::AckCorrelator;
use crate::config::SessionConfig;
use crate::dispatcher::EventDispatcher;
use crate::error::{AckError, CloseReason, SendError, SessionError};
use crate::liveness::Liveness;
use crate::metrics::{
    FRAMES_DISCARDED_TOTAL, SESSIONS_ACTIVE, SESSIONS_CLOSED_TOTAL, SESSIONS_OPENED_TOTAL,
};
use crate::overflow::OverflowRegistry;
use crate::queue::OutboundQueue;
use crate::transport::Transport;
use crate::{keepalive, reader, writer};

/// The HTTP request a connection was upgraded from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Request URI, including the query string.
    pub uri: String,
    /// Request headers in arrival order.
    pub headers: Vec<(String, String)>,
}

impl HandshakeRequest {
    /// First header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Connection metadata captured at construction. Immutable afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionMeta {
    /// Peer address, when the transport knows it.
    pub remote_addr: Option<SocketAddr>,
    /// Originating upgrade request.
    pub request: Option<HandshakeRequest>,
}

/// Externally visible lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, no handshake yet.
    New,
    /// Handshake applied.
    Open,
    /// Torn down. Terminal.
    Closed,
}

/// Queue pressure as seen by the writer before a dequeue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Backpressure {
    Normal,
    Soft { depth: usize },
    Overflow { depth: usize },
}

/// A single client connection.
pub struct Session {
    connection_id: ConnectionId,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<dyn EventDispatcher>,
    overflow: OverflowRegistry,
    queue: OutboundQueue,
    handshake: OnceLock<Handshake>,
    liveness: Liveness,
    acks: AckCorrelator,
    config: SessionConfig,
    meta: SessionMeta,
    opened_at: Instant,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connection_id", &self.connection_id)
            .field("sid", &self.id())
            .field("state", &self.state())
            .field("queue_depth", &self.queue.depth())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session around `transport`. Nothing runs until [`Session::start`].
    pub fn new(
        transport: impl Transport,
        dispatcher: Arc<dyn EventDispatcher>,
        overflow: OverflowRegistry,
        config: SessionConfig,
        meta: SessionMeta,
    ) -> Arc<Self> {
        let connection_id = ConnectionId::new();
        counter!(SESSIONS_OPENED_TOTAL).increment(1);
        gauge!(SESSIONS_ACTIVE).increment(1.0);
        debug!(
            connection_id = %connection_id,
            remote_addr = ?meta.remote_addr,
            queue_capacity = config.queue_capacity,
            "session created"
        );
        Arc::new(Self {
            connection_id,
            transport: Arc::new(transport),
            dispatcher,
            overflow,
            queue: OutboundQueue::new(config.queue_capacity),
            handshake: OnceLock::new(),
            liveness: Liveness::new(),
            acks: AckCorrelator::new(),
            config,
            meta,
            opened_at: Instant::now(),
        })
    }

    /// Spawn the reader, writer and keepalive tasks.
    pub fn start(self: &Arc<Self>) -> SessionHandle {
        SessionHandle {
            session: self.clone(),
            reader: tokio::spawn(reader::run_reader(self.clone())),
            writer: tokio::spawn(writer::run_writer(self.clone())),
            keepalive: tokio::spawn(keepalive::run_keepalive(self.clone())),
        }
    }

    /// Engine-assigned id, stable from construction.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Peer session id from the handshake, once open.
    pub fn id(&self) -> Option<&str> {
        self.handshake.get().map(|h| h.sid.as_str())
    }

    /// The handshake header, once open.
    pub fn handshake(&self) -> Option<&Handshake> {
        self.handshake.get()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if !self.liveness.is_alive() {
            SessionState::Closed
        } else if self.handshake.get().is_some() {
            SessionState::Open
        } else {
            SessionState::New
        }
    }

    /// Whether [`Session::close`] has not run yet.
    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Metadata captured at construction.
    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    /// Peer address, when the transport reported one.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.meta.remote_addr
    }

    /// Limits this session was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Frames waiting for the writer.
    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// Correlated sends still waiting for a reply.
    pub fn pending_acks(&self) -> usize {
        self.acks.pending_count()
    }

    /// Send an event that expects no reply.
    pub fn emit(&self, event: &str, args: Value) -> Result<(), SendError> {
        self.enqueue(encode_emit(event, &args))
    }

    /// Send an event and wait up to `deadline` for the peer's reply.
    ///
    /// The waiter is registered before the frame is queued, so a reply can
    /// never arrive ahead of its waiter.
    pub async fn ack(&self, event: &str, args: Value, deadline: Duration) -> Result<Value, AckError> {
        let (id, rx) = self.acks.register();
        if let Err(e) = self.enqueue(encode_ack_request(id, event, &args)) {
            let _ = self.acks.cancel(id);
            return Err(e.into());
        }
        self.acks.wait(id, rx, deadline).await
    }

    /// [`Session::ack`] with the configured default deadline.
    pub async fn ack_default(&self, event: &str, args: Value) -> Result<Value, AckError> {
        self.ack(event, args, self.config.ack_timeout).await
    }

    /// Answer a peer's ack request `id`.
    pub fn reply_ack(&self, id: u64, args: Value) -> Result<(), SendError> {
        self.enqueue(encode_ack_response(id, &args))
    }

    /// Tear the session down. Only the first call has any effect; later and
    /// concurrent calls return immediately.
    pub async fn close(self: &Arc<Self>, reason: CloseReason) {
        if !self.liveness.compare_and_close() {
            return;
        }
        self.transport.close().await;
        let discarded = self.queue.shutdown();
        let abandoned_acks = self.acks.cancel_all();
        let _ = self.overflow.remove(&self.connection_id);

        counter!(SESSIONS_CLOSED_TOTAL, "reason" => reason.as_str()).increment(1);
        counter!(FRAMES_DISCARDED_TOTAL).increment(u64::try_from(discarded).unwrap_or(u64::MAX));
        gauge!(SESSIONS_ACTIVE).decrement(1.0);
        info!(
            connection_id = %self.connection_id,
            sid = self.id().unwrap_or_default(),
            reason = reason.as_str(),
            detail = %reason,
            discarded,
            abandoned_acks,
            uptime_ms = u64::try_from(self.opened_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "session closed"
        );

        self.dispatcher.on_disconnection(self.clone(), reason).await;
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn dispatcher(&self) -> &Arc<dyn EventDispatcher> {
        &self.dispatcher
    }

    pub(crate) fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub(crate) fn acks(&self) -> &AckCorrelator {
        &self.acks
    }

    pub(crate) fn enqueue(&self, frame: String) -> Result<(), SendError> {
        self.queue.push(frame)
    }

    /// Apply the handshake header. Returns `false` if one was already set.
    pub(crate) fn set_handshake(&self, handshake: Handshake) -> bool {
        self.handshake.set(handshake).is_ok()
    }

    /// Classify the current queue depth and update overflow registry
    /// membership to match.
    pub(crate) fn apply_backpressure(&self) -> Backpressure {
        let depth = self.queue.depth();
        let capacity = self.config.queue_capacity;
        if depth >= capacity.saturating_sub(1) {
            return Backpressure::Overflow { depth };
        }
        if depth > capacity / 2 {
            // Under the liveness lock so a concurrent close cannot remove the
            // entry before it is inserted.
            let _ = self.liveness.while_alive(|| self.overflow.insert(&self.connection_id));
            Backpressure::Soft { depth }
        } else {
            let _ = self.overflow.remove(&self.connection_id);
            Backpressure::Normal
        }
    }
}

/// Task handles for a started session.
#[derive(Debug)]
pub struct SessionHandle {
    session: Arc<Session>,
    reader: JoinHandle<Result<(), SessionError>>,
    writer: JoinHandle<Result<(), SessionError>>,
    keepalive: JoinHandle<()>,
}

impl SessionHandle {
    /// The session whose tasks this handle owns.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Wait for the reader and writer to finish. Returns the first loop
    /// error, if any.
    ///
    /// The keepalive task is not awaited; it notices the closed session on
    /// its next tick.
    pub async fn join(self) -> Result<(), SessionError> {
        let Self {
            session,
            reader,
            writer,
            keepalive,
        } = self;
        drop(keepalive);

        let reader = flatten(reader.await);
        let writer = flatten(writer.await);
        for (task, result) in [("reader", &reader), ("writer", &writer)] {
            match result {
                Ok(()) => {}
                Err(SessionError::Task(e)) => {
                    warn!(connection_id = %session.connection_id(), task, error = %e, "session task failed");
                }
                Err(e) => {
                    debug!(connection_id = %session.connection_id(), task, error = %e, "session loop ended with error");
                }
            }
        }
        reader.and(writer)
    }
}

fn flatten(joined: Result<Result<(), SessionError>, tokio::task::JoinError>) -> Result<(), SessionError> {
    joined.map_err(|e| SessionError::Task(e.to_string()))?
}
