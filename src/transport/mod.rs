//! Live audio transport capability.
//!
//! The WebRTC room lifecycle (join, publish, subscribe) is an external
//! collaborator: the engine consumes it as an opaque capability that
//! connects with a URL + token, toggles the outgoing microphone track, and
//! emits lifecycle events.  [`Transport`] is that seam; the production
//! implementation lives with the deployment (an SFU client), while
//! [`LoopbackTransport`] provides a dependency-free implementation for
//! development and tests.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod loopback;

pub use loopback::LoopbackTransport;

// ---------------------------------------------------------------------------
// TransportEvent
// ---------------------------------------------------------------------------

/// Events emitted by the transport after a successful `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session is established.
    Connected,
    /// The session ended (remote close, network loss, or local disconnect).
    Disconnected,
    /// The outgoing microphone track is live.
    LocalTrackPublished,
    /// A remote audio track became available; the transport renders it.
    TrackSubscribed,
}

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Errors from the transport capability.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("transport connect failed: {0}")]
    Connect(String),

    #[error("transport is not connected")]
    NotConnected,
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Capability of joining a live audio session.
///
/// One event stream exists per connection; it closes when the session ends.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a session at `url` with `token`.
    ///
    /// On success the returned receiver yields [`TransportEvent`]s for the
    /// lifetime of the session.
    async fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError>;

    /// Enable or disable the outgoing microphone track.
    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError>;

    /// Close the session.  Idempotent; a no-op when not connected.
    async fn disconnect(&self);
}
