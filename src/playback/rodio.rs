//! Audio output via rodio.
//!
//! [`RodioSink`] decodes a complete encoded clip (the backend sends MP3;
//! rodio's decoder also accepts WAV/FLAC/Vorbis) and plays it through the
//! default output device.  The `rodio::OutputStream` is not `Send`, so it
//! lives on a dedicated thread for the lifetime of the sink; playback
//! handles only need the (shareable) `OutputStreamHandle`.

use std::io::Cursor;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tokio::sync::oneshot;

use super::{ActivePlayback, PlaybackControls, PlaybackError, SpeechSink};

// ---------------------------------------------------------------------------
// RodioSink
// ---------------------------------------------------------------------------

/// Production speech sink on the default output device.
pub struct RodioSink {
    handle: OutputStreamHandle,
    /// Dropping this ends the thread that owns the `OutputStream`.
    _shutdown: std_mpsc::Sender<()>,
}

impl RodioSink {
    /// Open the default audio output device.
    ///
    /// Spawns the stream-owner thread and blocks until the device is open
    /// (or has failed to open).
    pub fn new() -> Result<Self, PlaybackError> {
        let (ready_tx, ready_rx) =
            std_mpsc::channel::<Result<OutputStreamHandle, PlaybackError>>();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("speech-output".into())
            .spawn(move || {
                let stream = match OutputStream::try_default() {
                    Ok((stream, handle)) => {
                        let _ = ready_tx.send(Ok(handle));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(PlaybackError::Start(e.to_string())));
                        return;
                    }
                };

                // Keep the OutputStream alive until the sink is dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| PlaybackError::Start(e.to_string()))?;

        let handle = ready_rx
            .recv()
            .map_err(|_| PlaybackError::Start("audio output thread died".into()))??;

        Ok(Self {
            handle,
            _shutdown: shutdown_tx,
        })
    }
}

struct SinkControls {
    sink: Arc<Sink>,
}

impl PlaybackControls for SinkControls {
    fn stop(&self) {
        self.sink.stop();
    }
}

impl SpeechSink for RodioSink {
    fn start(&self, clip: Vec<u8>) -> Result<ActivePlayback, PlaybackError> {
        let source =
            Decoder::new(Cursor::new(clip)).map_err(|e| PlaybackError::Decode(e.to_string()))?;

        let sink = Sink::try_new(&self.handle).map_err(|e| PlaybackError::Start(e.to_string()))?;
        let sink = Arc::new(sink);
        sink.append(source);

        let (done_tx, done) = oneshot::channel();
        let waiter = Arc::clone(&sink);
        std::thread::Builder::new()
            .name("speech-playback".into())
            .spawn(move || {
                // Returns on natural completion and on stop().
                waiter.sleep_until_end();
                let _ = done_tx.send(());
            })
            .map_err(|e| PlaybackError::Start(e.to_string()))?;

        Ok(ActivePlayback {
            controls: Arc::new(SinkControls { sink }),
            done,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Garbage bytes must fail with a decode error, not a panic —
    /// exercised without any audio device.
    #[test]
    fn undecodable_clip_is_a_decode_error() {
        // Decoder construction happens before any device access, so this
        // holds even where RodioSink::new() would fail.
        let result = Decoder::new(Cursor::new(vec![0xFF_u8; 64]));
        assert!(result.is_err());
    }

    /// `RodioSink` must be shareable across tasks.
    #[test]
    fn rodio_sink_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RodioSink>();
    }
}
