//! Turn gate — the single-flight tracker for voice turns.
//!
//! [`TurnGate`] replaces ad hoc guard booleans with one explicit state
//! machine checked and transitioned atomically at every suspension
//! boundary.  All transitions happen under one brief mutex lock that never
//! spans an `.await`, so a check-and-set can not interleave with another
//! turn.
//!
//! ```text
//! Idle ──begin_session──▶ Recording ──try_begin_turn──▶ Processing
//!                             ▲                             │
//!                             ├──────────end_turn───────────┤
//!                             │                             ▼
//!                             └──────end_turn────────── Speaking
//! any state ──begin_disconnect…finish_disconnect──▶ Idle
//! ```
//!
//! Phase-mismatched transitions are tolerated as no-ops so that stale
//! continuations (a playback that finishes after a disconnect, say) cannot
//! corrupt the state.

use std::sync::Mutex;

// ---------------------------------------------------------------------------
// TurnPhase
// ---------------------------------------------------------------------------

/// Phases of the voice-turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// No session: the microphone loop is not running.
    Idle,

    /// Connected and listening; segments are accepted here.
    Recording,

    /// A turn is in flight (transcription or AI response pending).
    Processing,

    /// The AI's synthesized speech is playing.
    Speaking,
}

impl TurnPhase {
    /// Returns `true` while a turn occupies the pipeline — new segments are
    /// rejected, not queued.
    ///
    /// ```
    /// use voice_conversation::turn::TurnPhase;
    ///
    /// assert!(!TurnPhase::Idle.is_busy());
    /// assert!(!TurnPhase::Recording.is_busy());
    /// assert!(TurnPhase::Processing.is_busy());
    /// assert!(TurnPhase::Speaking.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, TurnPhase::Processing | TurnPhase::Speaking)
    }

    /// A short human-readable label for logs and status surfaces.
    pub fn label(&self) -> &'static str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Recording => "recording",
            TurnPhase::Processing => "processing",
            TurnPhase::Speaking => "speaking",
        }
    }
}

impl Default for TurnPhase {
    fn default() -> Self {
        TurnPhase::Idle
    }
}

// ---------------------------------------------------------------------------
// TurnGate
// ---------------------------------------------------------------------------

struct GateState {
    phase: TurnPhase,
    disconnecting: bool,
}

/// Mutual exclusion for voice turns.
///
/// Shared as `Arc<TurnGate>` between the session controller, the turn
/// pipeline and playback-completion tasks.
pub struct TurnGate {
    inner: Mutex<GateState>,
}

impl TurnGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GateState {
                phase: TurnPhase::Idle,
                disconnecting: false,
            }),
        }
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn phase(&self) -> TurnPhase {
        self.inner.lock().unwrap().phase
    }

    pub fn is_recording(&self) -> bool {
        self.phase() == TurnPhase::Recording
    }

    pub fn is_processing(&self) -> bool {
        self.phase() == TurnPhase::Processing
    }

    pub fn is_speaking(&self) -> bool {
        self.phase() == TurnPhase::Speaking
    }

    pub fn is_disconnecting(&self) -> bool {
        self.inner.lock().unwrap().disconnecting
    }

    // ── Transitions ────────────────────────────────────────────────────

    /// `Idle → Recording` when a session starts.
    pub fn begin_session(&self) {
        let mut st = self.inner.lock().unwrap();
        if st.phase != TurnPhase::Idle {
            log::debug!("gate: begin_session in phase {}", st.phase.label());
        }
        st.phase = TurnPhase::Recording;
    }

    /// Claim the pipeline for a new turn: `Recording → Processing`.
    ///
    /// Fails (returns `false`) when a disconnect is in progress or when a
    /// turn already occupies the pipeline — the caller drops its segment.
    pub fn try_begin_turn(&self) -> bool {
        let mut st = self.inner.lock().unwrap();
        if st.disconnecting || st.phase != TurnPhase::Recording {
            return false;
        }
        st.phase = TurnPhase::Processing;
        true
    }

    /// `Processing → Speaking` when synthesized speech is about to play.
    ///
    /// Returns `false` (no transition) outside `Processing` — e.g. after a
    /// disconnect reset the gate under an in-flight turn.
    pub fn begin_speaking(&self) -> bool {
        let mut st = self.inner.lock().unwrap();
        if st.phase != TurnPhase::Processing {
            log::debug!("gate: begin_speaking in phase {}", st.phase.label());
            return false;
        }
        st.phase = TurnPhase::Speaking;
        true
    }

    /// Release the pipeline: `Processing | Speaking → Recording`.
    ///
    /// Used on normal completion, abandoned turns, turn errors and playback
    /// completion alike.  A no-op in any other phase.
    pub fn end_turn(&self) {
        let mut st = self.inner.lock().unwrap();
        match st.phase {
            TurnPhase::Processing | TurnPhase::Speaking => {
                st.phase = TurnPhase::Recording;
            }
            phase => {
                log::debug!("gate: end_turn in phase {}", phase.label());
            }
        }
    }

    /// Mark teardown as started; every pipeline entry point rejects from
    /// here on.
    pub fn begin_disconnect(&self) {
        self.inner.lock().unwrap().disconnecting = true;
    }

    /// Teardown finished: back to `Idle`, disconnect flag cleared.
    pub fn finish_disconnect(&self) {
        let mut st = self.inner.lock().unwrap();
        st.phase = TurnPhase::Idle;
        st.disconnecting = false;
    }
}

impl Default for TurnGate {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_gate() -> TurnGate {
        let gate = TurnGate::new();
        gate.begin_session();
        gate
    }

    // ---- Phase queries ---

    #[test]
    fn new_gate_is_idle() {
        let gate = TurnGate::new();
        assert_eq!(gate.phase(), TurnPhase::Idle);
        assert!(!gate.is_disconnecting());
    }

    #[test]
    fn begin_session_enters_recording() {
        let gate = recording_gate();
        assert!(gate.is_recording());
    }

    // ---- Single-flight claim ---

    #[test]
    fn claim_from_recording_succeeds() {
        let gate = recording_gate();
        assert!(gate.try_begin_turn());
        assert!(gate.is_processing());
    }

    #[test]
    fn claim_while_processing_fails() {
        let gate = recording_gate();
        assert!(gate.try_begin_turn());
        assert!(!gate.try_begin_turn());
        assert!(gate.is_processing());
    }

    #[test]
    fn claim_while_speaking_fails() {
        let gate = recording_gate();
        assert!(gate.try_begin_turn());
        assert!(gate.begin_speaking());
        assert!(!gate.try_begin_turn());
        assert!(gate.is_speaking());
    }

    #[test]
    fn claim_while_idle_fails() {
        let gate = TurnGate::new();
        assert!(!gate.try_begin_turn());
    }

    #[test]
    fn claim_while_disconnecting_fails() {
        let gate = recording_gate();
        gate.begin_disconnect();
        assert!(!gate.try_begin_turn());
    }

    // ---- Mutual exclusion invariant ---

    /// At most one of {processing, speaking} can hold at any instant: the
    /// phase is a single enum value, and each transition is atomic.
    #[test]
    fn processing_and_speaking_are_mutually_exclusive() {
        let gate = recording_gate();
        assert!(!gate.is_processing() && !gate.is_speaking());

        gate.try_begin_turn();
        assert!(gate.is_processing() && !gate.is_speaking());

        gate.begin_speaking();
        assert!(!gate.is_processing() && gate.is_speaking());

        gate.end_turn();
        assert!(!gate.is_processing() && !gate.is_speaking());
    }

    // ---- end_turn ---

    #[test]
    fn end_turn_from_processing_returns_to_recording() {
        let gate = recording_gate();
        gate.try_begin_turn();
        gate.end_turn();
        assert!(gate.is_recording());
    }

    #[test]
    fn end_turn_from_speaking_returns_to_recording() {
        let gate = recording_gate();
        gate.try_begin_turn();
        gate.begin_speaking();
        gate.end_turn();
        assert!(gate.is_recording());
    }

    /// A stale end_turn (after teardown reset the gate) must not resurrect
    /// the session.
    #[test]
    fn end_turn_after_disconnect_is_a_noop() {
        let gate = recording_gate();
        gate.try_begin_turn();
        gate.begin_disconnect();
        gate.finish_disconnect();

        gate.end_turn();
        assert_eq!(gate.phase(), TurnPhase::Idle);
    }

    // ---- begin_speaking guards ---

    #[test]
    fn begin_speaking_outside_processing_is_rejected() {
        let gate = recording_gate();
        assert!(!gate.begin_speaking());
        assert!(gate.is_recording());
    }

    // ---- Disconnect cycle ---

    #[test]
    fn disconnect_cycle_resets_everything() {
        let gate = recording_gate();
        gate.try_begin_turn();
        gate.begin_speaking();

        gate.begin_disconnect();
        assert!(gate.is_disconnecting());

        gate.finish_disconnect();
        assert_eq!(gate.phase(), TurnPhase::Idle);
        assert!(!gate.is_disconnecting());
    }

    #[test]
    fn session_can_restart_after_disconnect() {
        let gate = recording_gate();
        gate.begin_disconnect();
        gate.finish_disconnect();

        gate.begin_session();
        assert!(gate.try_begin_turn());
    }

    // ---- TurnPhase helpers ---

    #[test]
    fn phase_labels() {
        assert_eq!(TurnPhase::Idle.label(), "idle");
        assert_eq!(TurnPhase::Recording.label(), "recording");
        assert_eq!(TurnPhase::Processing.label(), "processing");
        assert_eq!(TurnPhase::Speaking.label(), "speaking");
    }

    #[test]
    fn default_phase_is_idle() {
        assert_eq!(TurnPhase::default(), TurnPhase::Idle);
    }
}
