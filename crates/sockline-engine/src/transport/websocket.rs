//! [`Transport`] over an upgraded axum [`WebSocket`].
//!
//! Text frames carry engine.io packets. Binary frames are accepted if they
//! are valid UTF-8. WebSocket-level ping/pong control frames are answered
//! by the socket itself and never surface as packets.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{PingParams, Transport, TransportError};

/// How long `close` waits to flush the close frame to the peer.
const CLOSE_FRAME_GRACE: Duration = Duration::from_secs(1);

/// A session transport over one WebSocket connection.
pub struct WebSocketTransport {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    ping: PingParams,
    closed: CancellationToken,
}

impl WebSocketTransport {
    /// Wrap an upgraded socket.
    pub fn new(socket: WebSocket, ping: PingParams) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            ping,
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn receive(&self) -> Result<String, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            let next = tokio::select! {
                () = self.closed.cancelled() => return Err(TransportError::Closed),
                next = stream.next() => next,
            };
            match next {
                None | Some(Ok(Message::Close(_))) => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data.to_vec())
                        .map_err(|e| TransportError::Io(format!("non-UTF8 binary frame: {e}")));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            }
        }
    }

    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        tokio::select! {
            () = self.closed.cancelled() => Err(TransportError::Closed),
            sent = sink.send(Message::Text(frame.into())) => {
                sent.map_err(|e| TransportError::Io(e.to_string()))
            }
        }
    }

    async fn close(&self) {
        self.closed.cancel();
        // A writer blocked on a slow peer holds the sink; it bails out on the
        // cancelled token and the socket closes when dropped.
        if let Ok(mut sink) = self.sink.try_lock() {
            close_sink::<_, Message>(&mut *sink, CLOSE_FRAME_GRACE).await;
        }
    }

    fn ping_params(&self) -> PingParams {
        self.ping
    }
}

/// Send the close frame, giving up after `grace` if the peer stopped reading.
async fn close_sink<S, T>(sink: &mut S, grace: Duration)
where
    S: Sink<T> + Unpin,
    S::Error: Display,
{
    match tokio::time::timeout(grace, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "websocket close frame not sent"),
        Err(_) => debug!(?grace, "websocket close frame not flushed in time"),
    }
}
