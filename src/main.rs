//! Application entry point — real-time AI voice conversation.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the HTTP backend client (`VOICE_BACKEND_URL` overrides config).
//! 4. Open the speech output (degrades to text-only without a device).
//! 5. Build the session controller over the microphone, transport and
//!    playback capabilities.
//! 6. Connect and mirror observable state changes to the log until Ctrl-C.
//! 7. Disconnect and exit.

use std::sync::Arc;
use std::time::Duration;

use voice_conversation::{
    audio::CpalMicrophone,
    backend::HttpBackend,
    config::AppConfig,
    playback::{NullSink, PlaybackController, RodioSink, SpeechSink},
    session::SessionController,
    transport::LoopbackTransport,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice conversation starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Backend client
    let backend = Arc::new(HttpBackend::from_config(&config.backend));
    log::info!("backend at {}", backend.base_url());

    // 4. Speech output (degrade gracefully without an output device)
    let sink: Arc<dyn SpeechSink> = match RodioSink::new() {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            log::warn!("Audio output unavailable ({e}); AI speech will be discarded");
            Arc::new(NullSink)
        }
    };
    let playback = Arc::new(PlaybackController::new(sink));

    // 5. Session controller
    //    The transport here is the loopback stand-in; a deployment wires its
    //    own SFU client through the `Transport` trait.
    let controller = SessionController::new(
        config,
        backend,
        Arc::new(LoopbackTransport::new()),
        Arc::new(CpalMicrophone::new()),
        playback,
    );

    // 6. Connect and run until Ctrl-C
    controller.connect().await?;
    log::info!("connected — speak into the microphone; Ctrl-C to end");

    let mut last_error: Option<String> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                // Transcript and reply changes are logged by the pipeline;
                // only surface errors here.
                let snap = controller.snapshot();
                if snap.error != last_error {
                    if let Some(message) = &snap.error {
                        log::warn!("{message}");
                    }
                    last_error = snap.error;
                }
            }
        }
    }

    // 7. Teardown
    controller.disconnect().await;
    log::info!("session ended");
    Ok(())
}
