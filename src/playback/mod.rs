//! AI-speech playback with an exclusive playback slot.
//!
//! [`PlaybackController`] owns the single active playback: starting a new
//! clip always stops and releases the previous one first, so at most one AI
//! utterance is audible at any time.  The actual audio output sits behind
//! the [`SpeechSink`] trait — [`rodio::RodioSink`] in production, a mock in
//! tests, [`NullSink`] when no output device is available.
//!
//! Completion is observed through the oneshot receiver returned by
//! [`PlaybackController::start`]; it resolves on natural end of the clip
//! *and* when the clip is stopped early, so a waiter can always make
//! progress.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::oneshot;

pub mod rodio;

pub use self::rodio::RodioSink;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors from starting AI-speech playback.
#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    /// The transport encoding (base64) or the audio container could not be
    /// decoded.
    #[error("failed to decode AI speech: {0}")]
    Decode(String),

    /// The output device rejected the clip.
    #[error("failed to start AI speech playback: {0}")]
    Start(String),
}

// ---------------------------------------------------------------------------
// SpeechSink trait
// ---------------------------------------------------------------------------

/// Stop control for one in-flight clip.
///
/// `stop` must be idempotent and must resolve the clip's completion signal.
pub trait PlaybackControls: Send + Sync {
    fn stop(&self);
}

/// One started clip: its stop control plus the completion signal.
pub struct ActivePlayback {
    pub controls: Arc<dyn PlaybackControls>,
    pub done: oneshot::Receiver<()>,
}

/// Capability of rendering one encoded audio clip.
pub trait SpeechSink: Send + Sync {
    /// Begin playing `clip` (a complete encoded audio file).
    fn start(&self, clip: Vec<u8>) -> Result<ActivePlayback, PlaybackError>;
}

// ---------------------------------------------------------------------------
// PlaybackController
// ---------------------------------------------------------------------------

/// Handle for one playback started through the controller.
pub struct PlaybackStarted {
    /// Identifies this playback for [`PlaybackController::finish`].
    pub generation: u64,
    /// Resolves when the clip ends (naturally or via stop).
    pub done: oneshot::Receiver<()>,
}

/// Sole owner of the active playback slot.
pub struct PlaybackController {
    sink: Arc<dyn SpeechSink>,
    current: Mutex<Option<(u64, Arc<dyn PlaybackControls>)>>,
    generation: AtomicU64,
}

impl PlaybackController {
    pub fn new(sink: Arc<dyn SpeechSink>) -> Self {
        Self {
            sink,
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Start playing `clip`, stopping and releasing any previous playback
    /// first.
    pub fn start(&self, clip: Vec<u8>) -> Result<PlaybackStarted, PlaybackError> {
        let mut current = self.current.lock().unwrap();
        if let Some((_, prev)) = current.take() {
            log::debug!("playback: stopping previous clip before starting a new one");
            prev.stop();
        }

        let active = self.sink.start(clip)?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *current = Some((generation, active.controls));

        Ok(PlaybackStarted {
            generation,
            done: active.done,
        })
    }

    /// Release the slot after natural completion of `generation`.
    ///
    /// A no-op when a newer playback has taken the slot since.
    pub fn finish(&self, generation: u64) {
        let mut current = self.current.lock().unwrap();
        if current.as_ref().is_some_and(|(gen, _)| *gen == generation) {
            *current = None;
        }
    }

    /// Stop and release whatever is playing.  Idempotent.
    pub fn stop(&self) {
        if let Some((_, controls)) = self.current.lock().unwrap().take() {
            controls.stop();
        }
    }

    /// Returns `true` while a clip occupies the slot.
    pub fn has_active(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }
}

// ---------------------------------------------------------------------------
// NullSink
// ---------------------------------------------------------------------------

/// Fallback sink for hosts without an audio output device.
///
/// Every clip "completes" immediately; the conversation continues text-only.
pub struct NullSink;

impl SpeechSink for NullSink {
    fn start(&self, clip: Vec<u8>) -> Result<ActivePlayback, PlaybackError> {
        log::warn!("no audio output — discarding {}-byte AI speech clip", clip.len());
        let (done_tx, done) = oneshot::channel();
        let _ = done_tx.send(());

        struct Noop;
        impl PlaybackControls for Noop {
            fn stop(&self) {}
        }

        Ok(ActivePlayback {
            controls: Arc::new(Noop),
            done,
        })
    }
}

// ---------------------------------------------------------------------------
// MockSpeechSink  (test-only)
// ---------------------------------------------------------------------------

/// A test double that records starts/stops and lets the test decide when a
/// clip completes.
#[cfg(test)]
pub struct MockSpeechSink {
    auto_complete: bool,
    fail: bool,
    starts: std::sync::atomic::AtomicUsize,
    stops: Arc<std::sync::atomic::AtomicUsize>,
    pending: Mutex<Vec<Arc<MockControls>>>,
}

#[cfg(test)]
struct MockControls {
    done: Mutex<Option<oneshot::Sender<()>>>,
    stops: Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MockControls {
    fn complete(&self) {
        if let Some(tx) = self.done.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
impl PlaybackControls for MockControls {
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.complete();
    }
}

#[cfg(test)]
impl MockSpeechSink {
    /// Clips stay "playing" until [`complete_all`](Self::complete_all).
    pub fn new() -> Self {
        Self {
            auto_complete: false,
            fail: false,
            starts: std::sync::atomic::AtomicUsize::new(0),
            stops: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Clips complete the moment they start.
    pub fn auto_complete() -> Self {
        Self {
            auto_complete: true,
            ..Self::new()
        }
    }

    /// Every `start` fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Complete every clip started so far.
    pub fn complete_all(&self) {
        for controls in self.pending.lock().unwrap().drain(..) {
            controls.complete();
        }
    }
}

#[cfg(test)]
impl SpeechSink for MockSpeechSink {
    fn start(&self, _clip: Vec<u8>) -> Result<ActivePlayback, PlaybackError> {
        if self.fail {
            return Err(PlaybackError::Start("mock sink refused the clip".into()));
        }

        self.starts.fetch_add(1, Ordering::SeqCst);
        let (done_tx, done) = oneshot::channel();
        let controls = Arc::new(MockControls {
            done: Mutex::new(Some(done_tx)),
            stops: Arc::clone(&self.stops),
        });

        if self.auto_complete {
            controls.complete();
        } else {
            self.pending.lock().unwrap().push(Arc::clone(&controls));
        }

        Ok(ActivePlayback { controls, done })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(sink: MockSpeechSink) -> (PlaybackController, Arc<MockSpeechSink>) {
        let sink = Arc::new(sink);
        (
            PlaybackController::new(Arc::clone(&sink) as Arc<dyn SpeechSink>),
            sink,
        )
    }

    #[test]
    fn start_occupies_the_slot() {
        let (controller, sink) = controller(MockSpeechSink::new());
        let started = controller.start(vec![1, 2, 3]).unwrap();

        assert!(controller.has_active());
        assert_eq!(sink.starts(), 1);
        assert_eq!(started.generation, 1);
    }

    /// Starting a second clip stops and replaces the first — never more than
    /// one playback exists at a time.
    #[test]
    fn second_start_stops_the_first() {
        let (controller, sink) = controller(MockSpeechSink::new());
        let _first = controller.start(vec![1]).unwrap();
        let second = controller.start(vec![2]).unwrap();

        assert_eq!(sink.starts(), 2);
        assert_eq!(sink.stops(), 1);
        assert!(controller.has_active());
        assert_eq!(second.generation, 2);
    }

    /// Stopping a clip resolves its completion signal.
    #[tokio::test]
    async fn stop_resolves_done() {
        let (controller, sink) = controller(MockSpeechSink::new());
        let started = controller.start(vec![1]).unwrap();

        controller.stop();
        assert!(!controller.has_active());
        assert_eq!(sink.stops(), 1);
        // The receiver resolves (value or sender-drop, either ends the wait).
        let _ = started.done.await;
    }

    #[test]
    fn finish_releases_the_slot() {
        let (controller, _sink) = controller(MockSpeechSink::auto_complete());
        let started = controller.start(vec![1]).unwrap();

        controller.finish(started.generation);
        assert!(!controller.has_active());
    }

    /// A stale finish must not release a newer playback.
    #[test]
    fn stale_finish_is_ignored() {
        let (controller, _sink) = controller(MockSpeechSink::new());
        let first = controller.start(vec![1]).unwrap();
        let _second = controller.start(vec![2]).unwrap();

        controller.finish(first.generation);
        assert!(controller.has_active());
    }

    #[test]
    fn failed_start_leaves_slot_empty() {
        let (controller, sink) = controller(MockSpeechSink::failing());
        assert!(controller.start(vec![1]).is_err());
        assert!(!controller.has_active());
        assert_eq!(sink.starts(), 0);
    }

    #[test]
    fn stop_when_idle_is_a_noop() {
        let (controller, sink) = controller(MockSpeechSink::new());
        controller.stop();
        assert_eq!(sink.stops(), 0);
    }

    #[tokio::test]
    async fn null_sink_completes_immediately() {
        let controller = PlaybackController::new(Arc::new(NullSink));
        let started = controller.start(vec![0; 128]).unwrap();
        started.done.await.expect("completion fires at once");
    }
}
