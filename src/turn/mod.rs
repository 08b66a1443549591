//! Voice-turn execution: the single-flight gate and the turn pipeline.
//!
//! # Architecture
//!
//! ```text
//! SegmentRecorder ──AudioSegment──▶ TurnPipeline::submit()
//!                                        │
//!                            TurnGate (Recording → Processing → Speaking)
//!                                        │
//!                        backend /transcribe → /respond → playback
//! ```
//!
//! The gate is the system's only mutual-exclusion mechanism: submission
//! claims it in one check-and-set step, so concurrent segments are rejected
//! rather than queued, and at most one turn is ever in flight.

pub mod gate;
pub mod runner;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use gate::{TurnGate, TurnPhase};
pub use runner::TurnPipeline;
