//! Audio pipeline — microphone capture → energy VAD → segment recorder.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → MicFrame (mpsc) → downmix
//!           ├─▶ VadMonitor (512-sample frames → speaking/silence)
//!           └─▶ SegmentRecorder (PCM accumulation → WAV clip ≥ min bytes)
//! ```
//!
//! The session controller drives both consumers from the same frame stream:
//! every frame feeds the recorder, every analysis window feeds the VAD, and
//! a VAD boundary closes the clip.

pub mod capture;
pub mod encode;
pub mod level;
pub mod segment;
pub mod vad;

pub use capture::{CaptureError, CpalMicrophone, MicFrame, MicHandle, Microphone, OpenMic};
pub use segment::{AudioSegment, SegmentRecorder};
pub use vad::{VadEvent, VadMonitor};
