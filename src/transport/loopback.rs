//! Loopback transport — a dependency-free [`Transport`] implementation.
//!
//! Mirrors the observable behaviour of a real room client without any
//! network: `connect` emits [`TransportEvent::Connected`], enabling the
//! microphone emits [`TransportEvent::LocalTrackPublished`], `disconnect`
//! emits [`TransportEvent::Disconnected`] and closes the event stream.
//! Used by the binary when no SFU client is wired in, and by tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Transport, TransportError, TransportEvent};

/// In-process stand-in for a live room connection.
#[derive(Default)]
pub struct LoopbackTransport {
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a session is open.
    pub fn is_connected(&self) -> bool {
        self.events
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    fn send(&self, event: TransportEvent) -> Result<(), TransportError> {
        let guard = self.events.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => {
                let _ = tx.send(event);
                Ok(())
            }
            None => Err(TransportError::NotConnected),
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError> {
        if url.is_empty() || token.is_empty() {
            return Err(TransportError::Connect(
                "missing transport URL or token".into(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(TransportEvent::Connected);
        *self.events.lock().unwrap() = Some(tx);

        log::info!("loopback transport connected to {url}");
        Ok(rx)
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        if enabled {
            self.send(TransportEvent::LocalTrackPublished)
        } else {
            // Nothing to publish; the track simply stops.
            Ok(())
        }
    }

    async fn disconnect(&self) {
        let tx = self.events.lock().unwrap().take();
        if let Some(tx) = tx {
            let _ = tx.send(TransportEvent::Disconnected);
            log::info!("loopback transport disconnected");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
