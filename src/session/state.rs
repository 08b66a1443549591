//! Observable session state — the single source of truth for whatever sits
//! above the engine (a UI, a log mirror, a test).
//!
//! [`SessionState`] is held behind [`SharedSessionState`]
//! (`Arc<Mutex<SessionState>>`) — cheap to clone and safe to share across
//! tasks.  The controller and pipeline mutate it; the surface above snapshots
//! it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long a surfaced error stays visible before it clears itself.
pub const ERROR_DISPLAY: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Connection lifecycle states.
///
/// The cycle is `Disconnected → Connecting → Connected → Disconnected`;
/// failures during connecting simply return to `Disconnected` with a
/// surfaced error — there is no separate error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl SessionStatus {
    /// A short human-readable label suitable for display.
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Disconnected
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Everything observable about the session.
///
/// Only the latest turn's transcript and response are retained; a new turn
/// overwrites them and disconnecting clears them.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Connection lifecycle state.
    pub status: SessionStatus,
    /// `true` once the outgoing microphone track is live.
    pub mic_active: bool,
    /// Transient user-visible error, auto-cleared after [`ERROR_DISPLAY`].
    pub error: Option<String>,
    /// Latest transcript of the user's speech.
    pub transcript: Option<String>,
    /// Latest AI reply text.
    pub ai_response: Option<String>,
    /// Bumped on every surfaced error so an old clear timer cannot wipe a
    /// newer message.
    error_generation: u64,
}

/// Thread-safe handle to [`SessionState`].
///
/// Lock for a short critical section; do **not** hold the lock across an
/// `.await` point.
pub type SharedSessionState = Arc<Mutex<SessionState>>;

/// Construct a new [`SharedSessionState`] with default contents.
pub fn new_shared_state() -> SharedSessionState {
    Arc::new(Mutex::new(SessionState::default()))
}

/// Surface `message` as the visible error and schedule its clearance.
///
/// The message disappears after [`ERROR_DISPLAY`] unless a newer error has
/// replaced it in the meantime.  Must be called from within a tokio runtime.
pub fn set_transient_error(state: &SharedSessionState, message: impl Into<String>) {
    let message = message.into();
    log::error!("session error: {message}");

    let generation = {
        let mut st = state.lock().unwrap();
        st.error = Some(message);
        st.error_generation += 1;
        st.error_generation
    };

    let state = Arc::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(ERROR_DISPLAY).await;
        let mut st = state.lock().unwrap();
        if st.error_generation == generation {
            st.error = None;
        }
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
