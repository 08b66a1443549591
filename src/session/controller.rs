//! Session controller — the top-level lifecycle state machine.
//!
//! [`SessionController::connect`] walks microphone access → token fetch →
//! transport connect → outgoing track → VAD/recorder loop; a failure at any
//! step tears down whatever was partially established before the error is
//! reported, so no half-open session is ever left running.
//! [`SessionController::disconnect`] is an explicit cleanup sequence, and
//! dropping the controller triggers the same teardown — release runs on
//! every exit path.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::{level, MicFrame, MicHandle, Microphone, SegmentRecorder, VadEvent, VadMonitor};
use crate::backend::{BackendError, ConversationBackend};
use crate::config::{AppConfig, RecorderConfig, VadConfig};
use crate::playback::PlaybackController;
use crate::transport::{Transport, TransportError, TransportEvent};
use crate::turn::{TurnGate, TurnPipeline};

use super::cancel::{CancelSource, CancelToken};
use super::state::{
    new_shared_state, set_transient_error, SessionState, SessionStatus, SharedSessionState,
};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors that abort a `connect` attempt.
///
/// Turn-path failures (transcription, response, playback) never surface
/// here — they pass through the transient error state while the session
/// stays connected.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Microphone access was denied or no capture device exists.
    #[error("microphone access denied: {0}")]
    Permission(String),

    /// The token endpoint refused or the credential was unusable.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The transport session could not be established.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

struct ActiveSession {
    cancel: CancelSource,
    /// Dropping this stops microphone capture.
    _mic: MicHandle,
}

/// Owns one conversation session end to end.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use voice_conversation::audio::CpalMicrophone;
/// use voice_conversation::backend::HttpBackend;
/// use voice_conversation::config::AppConfig;
/// use voice_conversation::playback::{NullSink, PlaybackController};
/// use voice_conversation::session::SessionController;
/// use voice_conversation::transport::LoopbackTransport;
///
/// #[tokio::main]
/// async fn main() {
///     let config = AppConfig::default();
///     let controller = SessionController::new(
///         config.clone(),
///         Arc::new(HttpBackend::from_config(&config.backend)),
///         Arc::new(LoopbackTransport::new()),
///         Arc::new(CpalMicrophone::new()),
///         Arc::new(PlaybackController::new(Arc::new(NullSink))),
///     );
///
///     controller.connect().await.expect("connect failed");
///     // … conversation runs; observable state via controller.snapshot() …
///     controller.disconnect().await;
/// }
/// ```
pub struct SessionController {
    config: AppConfig,
    backend: Arc<dyn ConversationBackend>,
    transport: Arc<dyn Transport>,
    microphone: Arc<dyn Microphone>,
    playback: Arc<PlaybackController>,
    gate: Arc<TurnGate>,
    state: SharedSessionState,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionController {
    pub fn new(
        config: AppConfig,
        backend: Arc<dyn ConversationBackend>,
        transport: Arc<dyn Transport>,
        microphone: Arc<dyn Microphone>,
        playback: Arc<PlaybackController>,
    ) -> Self {
        Self {
            config,
            backend,
            transport,
            microphone,
            playback,
            gate: Arc::new(TurnGate::new()),
            state: new_shared_state(),
            active: Mutex::new(None),
        }
    }

    /// Shared handle to the observable session state.
    pub fn state(&self) -> SharedSessionState {
        Arc::clone(&self.state)
    }

    /// A point-in-time copy of the observable session state.
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().unwrap().clone()
    }

    /// Current connection status.
    pub fn status(&self) -> SessionStatus {
        self.state.lock().unwrap().status
    }

    // ── connect ────────────────────────────────────────────────────────

    /// Establish the session and start the conversation loop.
    ///
    /// Any failure aborts the whole sequence: partially established
    /// resources are torn down, the error surfaces through the transient
    /// error state, and the status returns to `Disconnected`.
    pub async fn connect(&self) -> Result<(), SessionError> {
        if self.active.lock().unwrap().is_some() {
            log::warn!("connect requested while a session is active — ignoring");
            return Ok(());
        }

        {
            let mut st = self.state.lock().unwrap();
            st.status = SessionStatus::Connecting;
            st.error = None;
        }
        log::info!("connecting");

        // 1. Microphone access.
        let open_mic = match self.microphone.open() {
            Ok(open) => open,
            Err(e) => return Err(self.fail_connect(SessionError::Permission(e.to_string()))),
        };

        // 2. Transport credential.  The microphone handle is dropped on any
        //    failure below, which stops capture.
        let participant = format!(
            "{}-{}",
            self.config.session.participant_prefix,
            unix_millis()
        );
        let grant = match self
            .backend
            .fetch_token(&self.config.session.room_name, &participant)
            .await
        {
            Ok(grant) => grant,
            Err(e) => return Err(self.fail_connect(SessionError::Backend(e))),
        };

        // 3. Transport session.
        let events = match self.transport.connect(&grant.url, &grant.token).await {
            Ok(events) => events,
            Err(e) => return Err(self.fail_connect(SessionError::Transport(e))),
        };

        // 4. Outgoing microphone track.
        if let Err(e) = self.transport.set_microphone_enabled(true).await {
            self.transport.disconnect().await;
            return Err(self.fail_connect(SessionError::Transport(e)));
        }

        // 5. Wire the conversation loop.
        let cancel = CancelSource::new();
        self.gate.begin_session();

        tokio::spawn(pump_events(events, Arc::clone(&self.state)));

        let pipeline = Arc::new(TurnPipeline::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.playback),
            Arc::clone(&self.gate),
            Arc::clone(&self.state),
            cancel.token(),
            self.config.recorder.min_clip_bytes,
        ));
        tokio::spawn(listen_loop(
            open_mic.frames,
            self.config.vad.clone(),
            self.config.recorder.clone(),
            pipeline,
            cancel.token(),
        ));

        *self.active.lock().unwrap() = Some(ActiveSession {
            cancel,
            _mic: open_mic.handle,
        });
        Ok(())
    }

    fn fail_connect(&self, error: SessionError) -> SessionError {
        set_transient_error(&self.state, error.to_string());
        self.state.lock().unwrap().status = SessionStatus::Disconnected;
        error
    }

    // ── disconnect ─────────────────────────────────────────────────────

    /// Tear the session down unconditionally.  Idempotent.
    ///
    /// In-flight turns self-cancel at their next suspension point, playback
    /// stops, the transport closes, and the observable state resets.
    pub async fn disconnect(&self) {
        let Some(active) = self.active.lock().unwrap().take() else {
            return;
        };
        log::info!("disconnecting");

        self.gate.begin_disconnect();
        active.cancel.cancel();
        self.playback.stop();
        self.transport.disconnect().await;
        drop(active); // stops microphone capture

        {
            let mut st = self.state.lock().unwrap();
            st.status = SessionStatus::Disconnected;
            st.mic_active = false;
            st.error = None;
            st.transcript = None;
            st.ai_response = None;
        }
        self.gate.finish_disconnect();
    }
}

impl Drop for SessionController {
    /// Teardown on owner drop: capture and playback stop synchronously; the
    /// transport close is spawned when a runtime is still available.
    fn drop(&mut self) {
        let Some(active) = self.active.lock().unwrap().take() else {
            return;
        };
        log::debug!("session controller dropped while connected — tearing down");

        self.gate.begin_disconnect();
        active.cancel.cancel();
        self.playback.stop();
        self.gate.finish_disconnect();

        let transport = Arc::clone(&self.transport);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { transport.disconnect().await });
        }
    }
}

fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Transport event pump
// ---------------------------------------------------------------------------

/// Mirror transport lifecycle events into the observable state.
///
/// Ends when the event stream closes (session over).
async fn pump_events(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    state: SharedSessionState,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Connected => {
                log::info!("transport connected");
                state.lock().unwrap().status = SessionStatus::Connected;
            }
            TransportEvent::Disconnected => {
                log::info!("transport disconnected");
                let mut st = state.lock().unwrap();
                st.status = SessionStatus::Disconnected;
                st.mic_active = false;
            }
            TransportEvent::LocalTrackPublished => {
                log::debug!("outgoing microphone track published");
                state.lock().unwrap().mic_active = true;
            }
            TransportEvent::TrackSubscribed => {
                // Remote audio is rendered by the transport itself.
                log::debug!("remote audio track subscribed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Microphone listen loop
// ---------------------------------------------------------------------------

/// Fan microphone frames into the VAD and the recorder; close a clip on
/// every boundary and hand it to the pipeline.
///
/// Boundaries are strictly sequential: the clip fully closes, the settle
/// delay elapses (frames arriving meanwhile are stale and dropped), and only
/// then does the next clip open.
async fn listen_loop(
    mut frames: mpsc::UnboundedReceiver<MicFrame>,
    vad_cfg: VadConfig,
    recorder_cfg: RecorderConfig,
    pipeline: Arc<TurnPipeline>,
    cancel: CancelToken,
) {
    let mut vad = VadMonitor::new(&vad_cfg);
    let mut recorder = SegmentRecorder::new(&recorder_cfg);
    let settle = vad_cfg.settle_delay();

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break, // capture ended
            },
        };

        if !recorder.is_recording() {
            recorder.start(frame.sample_rate);
        }

        let mono = level::downmix(&frame.samples, frame.channels);
        recorder.push(&mono);

        if vad.push_samples(&mono, frame.sample_rate) == Some(VadEvent::SegmentBoundary) {
            if let Some(segment) = recorder.finish() {
                log::debug!(
                    "utterance closed: {} bytes (~{:.1} s)",
                    segment.len(),
                    segment.duration_hint.as_secs_f32()
                );
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move { pipeline.submit(segment).await });
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(settle) => {}
            }
            while frames.try_recv().is_ok() {}
            // The next clip opens on the next frame received.
        }
    }

    recorder.abort();
    log::debug!("listen loop stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
