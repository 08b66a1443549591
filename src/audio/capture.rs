//! Microphone capture via `cpal`.
//!
//! [`CpalMicrophone`] wraps the cpal host/device/stream lifecycle behind the
//! [`Microphone`] trait.  Opening the microphone spawns a dedicated capture
//! thread that owns the (non-`Send`) cpal stream and forwards [`MicFrame`]s
//! over an unbounded channel until the returned [`MicHandle`] is dropped.

use std::sync::mpsc as std_mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// MicFrame
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the capture callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.  Use
/// [`crate::audio::level::downmix`] to fold channels before analysis.
#[derive(Debug, Clone)]
pub struct MicFrame {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this frame in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// No input device is available — the closest a native host gets to a
    /// denied microphone permission.
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(String),

    #[error("failed to build input stream: {0}")]
    BuildStream(String),

    #[error("failed to start audio stream: {0}")]
    PlayStream(String),
}

// ---------------------------------------------------------------------------
// MicHandle
// ---------------------------------------------------------------------------

/// RAII guard for an open microphone.
///
/// Dropping the handle signals the capture thread, which drops the cpal
/// stream and exits.  The frame channel closes shortly after.
pub struct MicHandle {
    stop_tx: Option<std_mpsc::Sender<()>>,
}

impl MicHandle {
    /// A handle with no capture thread behind it — used by test microphones
    /// whose frames come from the test body instead of real hardware.
    pub fn detached() -> Self {
        Self { stop_tx: None }
    }
}

impl Drop for MicHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // The thread may already have exited; either way it stops.
            let _ = tx.send(());
        }
    }
}

// ---------------------------------------------------------------------------
// Microphone trait
// ---------------------------------------------------------------------------

/// An open microphone: the live frame stream plus its RAII guard.
pub struct OpenMic {
    /// Frames as delivered by the capture callback.
    pub frames: mpsc::UnboundedReceiver<MicFrame>,
    /// Keep alive for as long as capture should run.
    pub handle: MicHandle,
}

/// Capability of acquiring the microphone.
///
/// The session controller consumes this trait so tests can drive the
/// VAD/recorder loop from synthetic frames without audio hardware.
pub trait Microphone: Send + Sync {
    /// Request microphone access and start streaming frames.
    fn open(&self) -> Result<OpenMic, CaptureError>;
}

// ---------------------------------------------------------------------------
// CpalMicrophone
// ---------------------------------------------------------------------------

/// Production microphone backed by the system default input device.
///
/// # Example
///
/// ```rust,no_run
/// use voice_conversation::audio::{CpalMicrophone, Microphone};
///
/// let mic = CpalMicrophone::new();
/// let mut open = mic.open().unwrap();
/// // `open.handle` keeps the stream alive; drop it to stop capturing.
/// while let Some(frame) = open.frames.blocking_recv() {
///     println!("received {} samples @ {}Hz", frame.samples.len(), frame.sample_rate);
/// }
/// ```
#[derive(Default)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }
}

impl Microphone for CpalMicrophone {
    /// Spawn the capture thread and wait for its setup result.
    ///
    /// The cpal stream is not `Send` on every platform, so it lives on a
    /// dedicated thread; `open` blocks only until the stream has started
    /// (or failed to).
    fn open(&self) -> Result<OpenMic, CaptureError> {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<MicFrame>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), CaptureError>>();

        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let stream = match build_input_stream(frame_tx) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Park until the handle is dropped (Err on sender drop too).
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| CaptureError::BuildStream(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(OpenMic {
                frames: frame_rx,
                handle: MicHandle {
                    stop_tx: Some(stop_tx),
                },
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::BuildStream(
                "capture thread exited before reporting readiness".into(),
            )),
        }
    }
}

/// Build and start the cpal input stream on the current thread.
fn build_input_stream(
    tx: mpsc::UnboundedSender<MicFrame>,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DefaultConfig(e.to_string()))?;

    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let frame = MicFrame {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(frame);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )
        .map_err(|e| CaptureError::BuildStream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::PlayStream(e.to_string()))?;

    log::info!("audio capture started ({sample_rate} Hz, {channels} ch)");
    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
