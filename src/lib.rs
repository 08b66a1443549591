//! Voice-Conversation — client-side voice-turn orchestration engine.
//!
//! Drives a real-time, turn-based spoken conversation with a remote AI
//! service: the microphone is monitored continuously, speech is segmented
//! into utterance clips by energy-based voice activity detection, each clip
//! runs through the remote transcribe → respond pipeline, and the AI's
//! synthesized speech is played back through a single exclusive playback
//! slot.
//!
//! # Architecture
//!
//! ```text
//! Microphone → MicFrame (mpsc) ─┬─▶ VadMonitor ──boundary──┐
//!                               └─▶ SegmentRecorder ◀──────┘
//!                                        │ finish() ≥ min bytes
//!                                        ▼
//!                                  TurnPipeline ──▶ /transcribe ──▶ /respond
//!                                        │                             │
//!                                  TurnGate (single-flight)      base64 audio
//!                                        │                             │
//!                                        ▼                             ▼
//!                                  SessionState ◀──────── PlaybackController
//! ```
//!
//! The [`session::SessionController`] owns the lifecycle: `connect()` walks
//! microphone → token → transport → recording, `disconnect()` tears all of
//! it down unconditionally.

pub mod audio;
pub mod backend;
pub mod config;
pub mod playback;
pub mod session;
pub mod transport;
pub mod turn;
