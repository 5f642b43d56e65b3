//! Bounded outbound frame queue.
//!
//! Many producers (pong auto-replies, keepalive pings, emits, ack requests)
//! push; the writer loop is the single consumer. Pushing never waits: a full
//! queue or a closed session is reported to the producer instead.
//!
//! Teardown needs to empty the queue from outside the consumer and leave a
//! terminal marker behind, so the queue is a locked `VecDeque` with a
//! [`Notify`] for the consumer rather than an `mpsc` channel.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::SendError;

/// Item handed to the writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// An encoded frame to write.
    Frame(String),
    /// Terminal marker: the session closed, stop writing.
    Shutdown,
}

#[derive(Debug, Default)]
struct State {
    items: VecDeque<Outbound>,
    closed: bool,
}

/// FIFO of encoded frames with a fixed capacity.
#[derive(Debug)]
pub struct OutboundQueue {
    state: Mutex<State>,
    capacity: usize,
    ready: Notify,
}

impl OutboundQueue {
    /// An empty queue holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            capacity,
            ready: Notify::new(),
        }
    }

    /// Capacity `C`.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently queued (the terminal marker counts once present).
    pub fn depth(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Append a frame without waiting.
    pub fn push(&self, frame: String) -> Result<(), SendError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SendError::Closed);
            }
            if state.items.len() >= self.capacity {
                return Err(SendError::QueueFull {
                    capacity: self.capacity,
                });
            }
            state.items.push_back(Outbound::Frame(frame));
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Wait for the next item.
    pub async fn pop(&self) -> Outbound {
        loop {
            let next = self.state.lock().items.pop_front();
            if let Some(item) = next {
                return item;
            }
            self.ready.notified().await;
        }
    }

    /// Drop everything queued, refuse further pushes and leave only the
    /// terminal marker. Returns how many frames were discarded.
    pub fn shutdown(&self) -> usize {
        let discarded = {
            let mut state = self.state.lock();
            state.closed = true;
            let discarded = state.items.len();
            state.items.clear();
            state.items.push_back(Outbound::Shutdown);
            discarded
        };
        self.ready.notify_one();
        discarded
    }
}
