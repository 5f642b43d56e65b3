//! Shared test doubles for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sockline_core::{Message, MessageType};
use sockline_engine::transport::mem::{MemoryPeer, memory_pair};
use sockline_engine::{
    CloseReason, EventDispatcher, OverflowRegistry, PingParams, Session, SessionConfig,
    SessionMeta,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub const OPEN_ABC: &str =
    r#"0{"sid":"abc","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":60000}"#;

/// One dispatcher callback, in the order the engine made them.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Connected { sid: Option<String>, alive: bool },
    Disconnected(CloseReason),
    Message(Message),
}

/// Dispatcher that records every callback. Optionally answers ack requests
/// by echoing their arguments.
#[derive(Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<Event>>,
    last_session: Mutex<Option<Arc<Session>>>,
    echo_acks: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn echoing() -> Arc<Self> {
        Arc::new(Self {
            echo_acks: true,
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn disconnections(&self) -> Vec<CloseReason> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Disconnected(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connections(&self) -> Vec<(Option<String>, bool)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Connected { sid, alive } => Some((sid.clone(), *alive)),
                _ => None,
            })
            .collect()
    }

    pub fn last_session(&self) -> Option<Arc<Session>> {
        self.last_session.lock().clone()
    }

    /// Poll until `done` holds, panicking after [`TIMEOUT`].
    pub async fn wait_until(&self, done: impl Fn(&Self) -> bool) {
        tokio::time::timeout(TIMEOUT, async {
            while !done(self) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}

#[async_trait]
impl EventDispatcher for RecordingDispatcher {
    async fn on_connection(&self, session: Arc<Session>) {
        self.events.lock().push(Event::Connected {
            sid: session.id().map(str::to_owned),
            alive: session.is_alive(),
        });
        *self.last_session.lock() = Some(session);
    }

    async fn on_disconnection(&self, _session: Arc<Session>, reason: CloseReason) {
        self.events.lock().push(Event::Disconnected(reason));
    }

    async fn on_message(&self, session: Arc<Session>, message: Message) {
        if self.echo_acks && message.kind == MessageType::AckRequest {
            if let Some(id) = message.ack_id {
                let _ = session.reply_ack(id, message.args.clone());
            }
        }
        self.events.lock().push(Event::Message(message));
    }
}

pub struct Harness {
    pub session: Arc<Session>,
    pub peer: MemoryPeer,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub registry: OverflowRegistry,
}

pub fn harness(capacity: usize, ping: PingParams) -> Harness {
    harness_with(RecordingDispatcher::new(), capacity, ping)
}

pub fn harness_with(
    dispatcher: Arc<RecordingDispatcher>,
    capacity: usize,
    ping: PingParams,
) -> Harness {
    let (transport, peer) = memory_pair(ping);
    let registry = OverflowRegistry::new();
    let session = Session::new(
        transport,
        dispatcher.clone(),
        registry.clone(),
        SessionConfig::default().with_queue_capacity(capacity),
        SessionMeta::default(),
    );
    Harness {
        session,
        peer,
        dispatcher,
        registry,
    }
}

/// Correlation id of an outbound `42N[...]` frame.
pub fn ack_id_of(frame: &str) -> u64 {
    let digits: String = frame
        .strip_prefix("42")
        .expect("not an event frame")
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().expect("frame carries no ack id")
}
