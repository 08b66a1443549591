//! Turn pipeline — drives one utterance through transcription and AI
//! response with strict single-flight semantics.
//!
//! # Pipeline flow
//!
//! ```text
//! AudioSegment
//!   └─▶ submit()
//!         ├─ reject: below min size / turn in flight / disconnecting
//!         ├─ /transcribe ──▶ < 2 chars → abandon silently
//!         │       └─ transcript observable immediately
//!         ├─ /respond ────▶ reply text observable, gate released
//!         └─ speech payload? → decode base64 → PlaybackController
//!                └─ completion task releases the Speaking phase
//! ```
//!
//! Rejection is deliberate backpressure: segments arriving during an active
//! turn are lost, never queued.  Every await runs under a `tokio::select!`
//! arm on the session's [`CancelToken`] so a disconnect abandons the turn at
//! its next suspension point.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::audio::AudioSegment;
use crate::backend::ConversationBackend;
use crate::playback::PlaybackController;
use crate::session::cancel::CancelToken;
use crate::session::state::{set_transient_error, SharedSessionState};

use super::gate::TurnGate;

// ---------------------------------------------------------------------------
// TurnPipeline
// ---------------------------------------------------------------------------

/// Executes voice turns one at a time.
///
/// One pipeline exists per connected session; the session's listen loop
/// spawns [`submit`](Self::submit) for every finished clip.
pub struct TurnPipeline {
    backend: Arc<dyn ConversationBackend>,
    playback: Arc<PlaybackController>,
    gate: Arc<TurnGate>,
    state: SharedSessionState,
    cancel: CancelToken,
    min_clip_bytes: usize,
}

impl TurnPipeline {
    pub fn new(
        backend: Arc<dyn ConversationBackend>,
        playback: Arc<PlaybackController>,
        gate: Arc<TurnGate>,
        state: SharedSessionState,
        cancel: CancelToken,
        min_clip_bytes: usize,
    ) -> Self {
        Self {
            backend,
            playback,
            gate,
            state,
            cancel,
            min_clip_bytes,
        }
    }

    /// Run one turn for `segment`.
    ///
    /// Returns without side effects when the segment is rejected (too
    /// small, turn in flight, or disconnecting).  Errors surface through
    /// the transient error state, never as a return value — the pipeline
    /// is always ready for the next segment afterwards.
    pub async fn submit(&self, segment: AudioSegment) {
        if segment.len() < self.min_clip_bytes {
            log::debug!(
                "turn: dropping {}-byte segment (minimum {})",
                segment.len(),
                self.min_clip_bytes
            );
            return;
        }

        if !self.gate.try_begin_turn() {
            log::debug!(
                "turn: dropping segment — gate is {} ({})",
                self.gate.phase().label(),
                if self.gate.is_disconnecting() {
                    "disconnecting"
                } else {
                    "turn in flight"
                }
            );
            return;
        }

        // ── Step A: transcription ────────────────────────────────────────
        log::debug!(
            "turn: transcribing {}-byte clip (~{:.1} s)",
            segment.len(),
            segment.duration_hint.as_secs_f32()
        );

        let transcript = tokio::select! {
            _ = self.cancel.cancelled() => {
                log::debug!("turn: cancelled during transcription");
                self.gate.end_turn();
                return;
            }
            result = self.backend.transcribe(&segment) => result,
        };

        let text = match transcript {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                set_transient_error(&self.state, e.to_string());
                self.gate.end_turn();
                return;
            }
        };

        // Shorter than two characters is noise, not speech — abandon the
        // turn without an error and without touching the observables.
        if text.chars().count() < 2 {
            log::debug!("turn: transcript too short ({:?}), abandoning", text);
            self.gate.end_turn();
            return;
        }

        log::info!("you: {text}");
        self.state.lock().unwrap().transcript = Some(text.clone());

        // ── Step B: AI response ──────────────────────────────────────────
        let reply = tokio::select! {
            _ = self.cancel.cancelled() => {
                log::debug!("turn: cancelled awaiting the AI response");
                self.gate.end_turn();
                return;
            }
            result = self.backend.respond(&text) => result,
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                set_transient_error(&self.state, e.to_string());
                self.gate.end_turn();
                return;
            }
        };

        log::info!("ai: {}", reply.response_text);
        self.state.lock().unwrap().ai_response = Some(reply.response_text.clone());

        // ── Step C: synthesized speech, when present ─────────────────────
        let Some(speech) = reply.speech() else {
            self.gate.end_turn();
            return;
        };

        let clip = match BASE64.decode(speech) {
            Ok(clip) => clip,
            Err(e) => {
                set_transient_error(&self.state, format!("failed to decode AI speech: {e}"));
                self.gate.end_turn();
                return;
            }
        };

        if !self.gate.begin_speaking() {
            // The session was torn down under us; nothing left to play into.
            return;
        }

        match self.playback.start(clip) {
            Ok(started) => {
                let gate = Arc::clone(&self.gate);
                let playback = Arc::clone(&self.playback);
                tokio::spawn(async move {
                    // Resolves on natural completion and on stop().
                    let _ = started.done.await;
                    playback.finish(started.generation);
                    gate.end_turn();
                });
            }
            Err(e) => {
                set_transient_error(&self.state, e.to_string());
                self.gate.end_turn();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
