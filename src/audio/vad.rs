//! Energy-based voice activity detection.
//!
//! [`VadMonitor`] classifies the live microphone stream into speaking and
//! silence and signals the boundary that closes one utterance.  It is a pure
//! state machine: callers feed it one analysis-frame energy value at a time
//! together with the audio time that frame spans, so the behaviour is fully
//! deterministic and independent of wall-clock scheduling.
//!
//! ## Algorithm
//!
//! A frame whose mean magnitude exceeds the activity threshold marks the
//! monitor as *speaking* and cancels any accumulated silence.  Once speech
//! has been observed, sub-threshold frames accumulate continuous silence;
//! when the accumulated silence reaches the configured window (2 s default)
//! a [`VadEvent::SegmentBoundary`] fires and the speaking flag resets.
//! Silence with no prior speech never fires a boundary.

use std::time::Duration;

use crate::config::VadConfig;

use super::level;

// ---------------------------------------------------------------------------
// VadEvent
// ---------------------------------------------------------------------------

/// Boundary signals emitted by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    /// An utterance has ended: close the current clip, settle, start fresh.
    SegmentBoundary,
}

// ---------------------------------------------------------------------------
// VadMonitor
// ---------------------------------------------------------------------------

/// Speaking/silence state machine over per-frame energy values.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use voice_conversation::audio::{VadEvent, VadMonitor};
/// use voice_conversation::config::VadConfig;
///
/// let cfg = VadConfig {
///     activity_threshold: 5.0,
///     silence_window_ms: 800,
///     ..VadConfig::default()
/// };
/// let mut vad = VadMonitor::new(&cfg);
/// let tick = Duration::from_millis(100);
///
/// assert_eq!(vad.update(8.0, tick), None); // speaking
/// for _ in 0..7 {
///     assert_eq!(vad.update(3.0, tick), None); // silence accumulating
/// }
/// // 8th silent frame reaches the 800 ms window
/// assert_eq!(vad.update(3.0, tick), Some(VadEvent::SegmentBoundary));
/// ```
pub struct VadMonitor {
    threshold: f32,
    silence_window: Duration,
    analysis_window: usize,
    /// Speech observed since the last boundary.
    speaking: bool,
    /// Continuous silence accumulated since speech last stopped.
    silence: Duration,
    /// Partial analysis frame carried between `push_samples` calls.
    pending: Vec<f32>,
}

impl VadMonitor {
    pub fn new(cfg: &VadConfig) -> Self {
        Self {
            threshold: cfg.activity_threshold,
            silence_window: cfg.silence_window(),
            analysis_window: cfg.analysis_window.max(1),
            speaking: false,
            silence: Duration::ZERO,
            pending: Vec::new(),
        }
    }

    /// Returns `true` when speech has been detected since the last boundary.
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Consume one analysis-frame energy value spanning `elapsed` audio time.
    ///
    /// Returns [`VadEvent::SegmentBoundary`] when continuous silence after
    /// speech reaches the configured window.  The boundary fires at most
    /// once per utterance; further silence is inert until speech restarts.
    pub fn update(&mut self, energy: f32, elapsed: Duration) -> Option<VadEvent> {
        if energy > self.threshold {
            self.speaking = true;
            self.silence = Duration::ZERO;
            return None;
        }

        if !self.speaking {
            return None;
        }

        self.silence += elapsed;
        if self.silence >= self.silence_window {
            self.speaking = false;
            self.silence = Duration::ZERO;
            return Some(VadEvent::SegmentBoundary);
        }

        None
    }

    /// Feed raw mono samples, windowing them into analysis frames.
    ///
    /// Frames of `analysis_window` samples are cut from the stream (a
    /// partial tail is carried over to the next call) and classified via
    /// [`update`](Self::update).  Returns the first boundary produced, if
    /// any; samples past a boundary are discarded — the settle delay that
    /// follows a boundary would drop them anyway.
    pub fn push_samples(&mut self, samples: &[f32], sample_rate: u32) -> Option<VadEvent> {
        if sample_rate == 0 {
            return None;
        }

        self.pending.extend_from_slice(samples);
        let frame_time =
            Duration::from_secs_f64(self.analysis_window as f64 / sample_rate as f64);

        let mut consumed = 0;
        let mut boundary = None;
        while self.pending.len() - consumed >= self.analysis_window {
            let frame = &self.pending[consumed..consumed + self.analysis_window];
            let energy = level::mean_magnitude(frame);
            consumed += self.analysis_window;

            if let Some(event) = self.update(energy, frame_time) {
                boundary = Some(event);
                self.pending.clear();
                return boundary;
            }
        }

        self.pending.drain(..consumed);
        boundary
    }

    /// Forget all detection state, including any partial analysis frame.
    pub fn reset(&mut self) {
        self.speaking = false;
        self.silence = Duration::ZERO;
        self.pending.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Config where the silence window spans exactly 8 unit frames.
    fn eight_frame_config() -> VadConfig {
        VadConfig {
            activity_threshold: 5.0,
            silence_window_ms: 800,
            ..VadConfig::default()
        }
    }

    fn tick() -> Duration {
        Duration::from_millis(100)
    }

    /// Reference scenario: energies [8,8,3,3,3,3,3,3,3,3,3] with threshold 5
    /// and a window covering 8 frames → the boundary fires exactly once, on
    /// the 8th consecutive sub-threshold frame following speech.
    #[test]
    fn boundary_fires_once_after_full_silence_window() {
        let mut vad = VadMonitor::new(&eight_frame_config());
        let energies = [8.0, 8.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0];

        let mut boundaries = Vec::new();
        for (i, &e) in energies.iter().enumerate() {
            if vad.update(e, tick()).is_some() {
                boundaries.push(i);
            }
        }

        // Speech at frames 0-1; silence from frame 2; 8th silent frame is
        // index 9.
        assert_eq!(boundaries, vec![9]);
    }

    /// Silence with no prior speech never triggers a boundary.
    #[test]
    fn silence_without_speech_never_fires() {
        let mut vad = VadMonitor::new(&eight_frame_config());
        for _ in 0..100 {
            assert_eq!(vad.update(1.0, tick()), None);
        }
        assert!(!vad.is_speaking());
    }

    /// Speech during the silence window cancels the pending timer; the full
    /// window must elapse again from scratch.
    #[test]
    fn speech_resets_accumulated_silence() {
        let mut vad = VadMonitor::new(&eight_frame_config());

        assert_eq!(vad.update(9.0, tick()), None);
        for _ in 0..7 {
            assert_eq!(vad.update(2.0, tick()), None);
        }
        // One frame short of the window — speech again.
        assert_eq!(vad.update(9.0, tick()), None);

        // The window must now run in full before a boundary fires.
        for _ in 0..7 {
            assert_eq!(vad.update(2.0, tick()), None);
        }
        assert_eq!(vad.update(2.0, tick()), Some(VadEvent::SegmentBoundary));
    }

    /// After a boundary the speaking flag resets, so trailing silence is
    /// inert until speech restarts.
    #[test]
    fn no_second_boundary_without_new_speech() {
        let mut vad = VadMonitor::new(&eight_frame_config());

        vad.update(9.0, tick());
        for _ in 0..7 {
            vad.update(2.0, tick());
        }
        assert_eq!(vad.update(2.0, tick()), Some(VadEvent::SegmentBoundary));

        for _ in 0..50 {
            assert_eq!(vad.update(2.0, tick()), None);
        }

        // A fresh utterance arms the monitor again.
        vad.update(9.0, tick());
        for _ in 0..7 {
            vad.update(2.0, tick());
        }
        assert_eq!(vad.update(2.0, tick()), Some(VadEvent::SegmentBoundary));
    }

    /// Energy exactly at the threshold counts as silence ("falls at or
    /// below threshold").
    #[test]
    fn threshold_energy_is_silence() {
        let mut vad = VadMonitor::new(&eight_frame_config());
        vad.update(9.0, tick());
        for _ in 0..7 {
            assert_eq!(vad.update(5.0, tick()), None);
        }
        assert_eq!(vad.update(5.0, tick()), Some(VadEvent::SegmentBoundary));
    }

    /// `push_samples` windows raw PCM into analysis frames and detects the
    /// same boundary as the frame-level API.
    #[test]
    fn push_samples_detects_boundary() {
        let cfg = VadConfig {
            activity_threshold: 0.1,
            // 512 samples @ 16 kHz = 32 ms per frame; 4 silent frames.
            silence_window_ms: 128,
            analysis_window: 512,
            ..VadConfig::default()
        };
        let mut vad = VadMonitor::new(&cfg);

        // One loud frame, then silence.
        assert_eq!(vad.push_samples(&vec![0.5_f32; 512], 16_000), None);
        assert!(vad.is_speaking());

        // Three silent frames — still inside the window.
        assert_eq!(vad.push_samples(&vec![0.0_f32; 512 * 3], 16_000), None);

        // Fourth silent frame completes the window.
        assert_eq!(
            vad.push_samples(&vec![0.0_f32; 512], 16_000),
            Some(VadEvent::SegmentBoundary)
        );
    }

    /// A partial analysis frame is carried over between calls.
    #[test]
    fn push_samples_carries_partial_frames() {
        let cfg = VadConfig {
            activity_threshold: 0.1,
            analysis_window: 512,
            ..VadConfig::default()
        };
        let mut vad = VadMonitor::new(&cfg);

        // 300 loud samples — not yet a full frame, no state change.
        assert_eq!(vad.push_samples(&vec![0.5_f32; 300], 16_000), None);
        assert!(!vad.is_speaking());

        // 300 more complete the frame (and leave 88 pending).
        assert_eq!(vad.push_samples(&vec![0.5_f32; 300], 16_000), None);
        assert!(vad.is_speaking());
    }

    /// `reset` disarms the monitor entirely.
    #[test]
    fn reset_clears_state() {
        let mut vad = VadMonitor::new(&eight_frame_config());
        vad.update(9.0, tick());
        for _ in 0..7 {
            vad.update(2.0, tick());
        }
        vad.reset();

        assert!(!vad.is_speaking());
        // The silence that would have completed the window is now inert.
        assert_eq!(vad.update(2.0, tick()), None);
    }

    /// Zero sample rate must not panic (division guard).
    #[test]
    fn zero_sample_rate_is_ignored() {
        let mut vad = VadMonitor::new(&eight_frame_config());
        assert_eq!(vad.push_samples(&[0.5; 512], 0), None);
    }
}
