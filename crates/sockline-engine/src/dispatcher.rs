//! Event dispatcher collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use sockline_core::Message;

use crate::error::CloseReason;
use crate::session::Session;

/// Application side of a session.
///
/// The engine calls it at exactly three points: once the handshake has been
/// processed, once on teardown, and for every inbound application frame.
/// `on_message` runs on its own task; a slow handler never stalls the reader.
#[async_trait]
pub trait EventDispatcher: Send + Sync + 'static {
    /// Handshake processed. Also fires after a malformed handshake closed
    /// the session, in which case `session.is_alive()` is already `false`.
    async fn on_connection(&self, _session: Arc<Session>) {}

    /// Session torn down. Fires exactly once per session.
    async fn on_disconnection(&self, _session: Arc<Session>, _reason: CloseReason) {}

    /// Inbound `Emit`, `AckRequest`, `Empty` or `Upgrade` frame.
    async fn on_message(&self, session: Arc<Session>, message: Message);
}
