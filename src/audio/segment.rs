//! Segment recorder — turns the continuous microphone stream into discrete
//! utterance clips aligned to VAD boundaries.
//!
//! [`SegmentRecorder::start`] opens a fresh clip (each call produces a new
//! one), [`push`](SegmentRecorder::push) accumulates mono PCM, and
//! [`finish`](SegmentRecorder::finish) encodes the clip as WAV and applies
//! the minimum-size gate: clips below `min_clip_bytes` contain negligible
//! audio and are dropped silently, never forwarded to the pipeline.

use std::time::Duration;

use crate::config::RecorderConfig;

use super::encode;

// ---------------------------------------------------------------------------
// AudioSegment
// ---------------------------------------------------------------------------

/// One finished utterance clip, ready for transcription.
///
/// Consumed exactly once by the turn pipeline.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Complete encoded audio file.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime_type: &'static str,
    /// Approximate clip length, derived from the captured sample count.
    pub duration_hint: Duration,
}

impl AudioSegment {
    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SegmentRecorder
// ---------------------------------------------------------------------------

struct Clip {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Accumulates mono PCM between VAD boundaries and emits encoded clips.
///
/// # Example
///
/// ```rust
/// use voice_conversation::audio::SegmentRecorder;
/// use voice_conversation::config::RecorderConfig;
///
/// let mut recorder = SegmentRecorder::new(&RecorderConfig { min_clip_bytes: 1_000 });
/// recorder.start(16_000);
/// recorder.push(&vec![0.1_f32; 16_000]); // 1 s of audio
/// let segment = recorder.finish().expect("well above the minimum size");
/// assert_eq!(segment.mime_type, "audio/wav");
/// ```
pub struct SegmentRecorder {
    min_clip_bytes: usize,
    clip: Option<Clip>,
}

impl SegmentRecorder {
    pub fn new(cfg: &RecorderConfig) -> Self {
        Self {
            min_clip_bytes: cfg.min_clip_bytes,
            clip: None,
        }
    }

    /// Open a fresh clip at `sample_rate`, discarding any clip in progress.
    pub fn start(&mut self, sample_rate: u32) {
        if self.clip.is_some() {
            log::debug!("recorder: restarting with a clip in progress — discarding it");
        }
        self.clip = Some(Clip {
            samples: Vec::new(),
            sample_rate,
        });
    }

    /// Returns `true` while a clip is open.
    pub fn is_recording(&self) -> bool {
        self.clip.is_some()
    }

    /// Append mono samples to the open clip.  No-op when stopped.
    pub fn push(&mut self, samples: &[f32]) {
        if let Some(clip) = self.clip.as_mut() {
            clip.samples.extend_from_slice(samples);
        }
    }

    /// Close the current clip and encode it.
    ///
    /// Returns `None` when no clip is open, when encoding fails, or when the
    /// encoded clip is below the minimum-size threshold (too short to be
    /// meaningful speech).
    pub fn finish(&mut self) -> Option<AudioSegment> {
        let clip = self.clip.take()?;

        let bytes = match encode::wav_bytes(&clip.samples, clip.sample_rate) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("recorder: clip encoding failed: {e}");
                return None;
            }
        };

        if bytes.len() < self.min_clip_bytes {
            log::debug!(
                "recorder: dropping {}-byte clip (minimum {})",
                bytes.len(),
                self.min_clip_bytes
            );
            return None;
        }

        let duration_hint = if clip.sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(clip.samples.len() as f64 / clip.sample_rate as f64)
        };

        Some(AudioSegment {
            bytes,
            mime_type: encode::WAV_MIME,
            duration_hint,
        })
    }

    /// Discard any clip in progress without emitting it.
    pub fn abort(&mut self) {
        self.clip = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(min_clip_bytes: usize) -> SegmentRecorder {
        SegmentRecorder::new(&RecorderConfig { min_clip_bytes })
    }

    /// Encoded size is 44 header bytes + 2 bytes per sample; pick sample
    /// counts that land just around the 10 000-byte gate.
    fn samples_for_encoded_size(encoded: usize) -> Vec<f32> {
        assert!(encoded >= 44 && (encoded - 44) % 2 == 0);
        vec![0.1_f32; (encoded - 44) / 2]
    }

    #[test]
    fn clip_below_minimum_is_dropped() {
        let mut rec = recorder(10_000);
        rec.start(16_000);
        rec.push(&samples_for_encoded_size(9_998));
        assert!(rec.finish().is_none());
    }

    #[test]
    fn clip_above_minimum_is_emitted() {
        let mut rec = recorder(10_000);
        rec.start(16_000);
        rec.push(&samples_for_encoded_size(10_002));
        let segment = rec.finish().expect("clip above the gate");
        assert_eq!(segment.len(), 10_002);
        assert_eq!(segment.mime_type, "audio/wav");
    }

    #[test]
    fn clip_exactly_at_minimum_is_emitted() {
        // The gate is "below minimum" — an exact hit passes.
        let mut rec = recorder(10_000);
        rec.start(16_000);
        rec.push(&samples_for_encoded_size(10_000));
        assert!(rec.finish().is_some());
    }

    #[test]
    fn finish_without_start_returns_none() {
        let mut rec = recorder(10_000);
        assert!(rec.finish().is_none());
        assert!(!rec.is_recording());
    }

    #[test]
    fn push_without_start_is_ignored() {
        let mut rec = recorder(44);
        rec.push(&[0.5; 1_000]);
        assert!(rec.finish().is_none());
    }

    /// Each `start` opens a fresh clip; samples never leak across clips.
    #[test]
    fn restart_produces_fresh_clip() {
        let mut rec = recorder(44);
        rec.start(16_000);
        rec.push(&[0.5; 500]);
        rec.start(16_000);
        rec.push(&[0.5; 100]);

        let segment = rec.finish().expect("second clip");
        assert_eq!(segment.len(), 44 + 200);
    }

    #[test]
    fn finish_closes_the_clip() {
        let mut rec = recorder(44);
        rec.start(16_000);
        rec.push(&[0.5; 100]);
        assert!(rec.is_recording());

        let _ = rec.finish();
        assert!(!rec.is_recording());
        // A second finish has nothing to emit.
        assert!(rec.finish().is_none());
    }

    #[test]
    fn abort_discards_clip() {
        let mut rec = recorder(44);
        rec.start(16_000);
        rec.push(&[0.5; 1_000]);
        rec.abort();
        assert!(!rec.is_recording());
        assert!(rec.finish().is_none());
    }

    #[test]
    fn duration_hint_reflects_sample_count() {
        let mut rec = recorder(44);
        rec.start(16_000);
        rec.push(&[0.1; 8_000]); // 0.5 s at 16 kHz
        let segment = rec.finish().unwrap();
        assert!((segment.duration_hint.as_secs_f64() - 0.5).abs() < 1e-9);
    }
}
