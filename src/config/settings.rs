//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Environment variable that overrides the configured backend base URL.
pub const BACKEND_URL_ENV: &str = "VOICE_BACKEND_URL";

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Settings for the remote conversation backend (token / transcribe / respond).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend, e.g. `http://localhost:8000`.
    ///
    /// Overridden at runtime by the `VOICE_BACKEND_URL` environment variable
    /// when that variable is set and non-empty.
    pub base_url: String,
    /// Maximum seconds to wait for any single backend request.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    /// Base URL with the environment override applied.
    pub fn effective_base_url(&self) -> String {
        std::env::var(BACKEND_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.base_url.clone())
    }
}

// ---------------------------------------------------------------------------
// VadConfig
// ---------------------------------------------------------------------------

/// Settings for voice-activity detection.
///
/// These are tunable configuration, not hardcoded business logic; the
/// defaults match the reference behaviour (2 s silence window, 100 ms
/// settle delay, 512-sample analysis window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// Mean-magnitude energy level above which a frame counts as speech.
    pub activity_threshold: f32,
    /// Continuous silence (ms) after speech that closes an utterance.
    pub silence_window_ms: u64,
    /// Pause (ms) between closing one clip and opening the next.
    pub settle_delay_ms: u64,
    /// Analysis frame size in samples.
    pub analysis_window: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            activity_threshold: 0.01,
            silence_window_ms: 2_000,
            settle_delay_ms: 100,
            analysis_window: 512,
        }
    }
}

impl VadConfig {
    /// Silence window as a [`std::time::Duration`].
    pub fn silence_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.silence_window_ms)
    }

    /// Settle delay as a [`std::time::Duration`].
    pub fn settle_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.settle_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// RecorderConfig
// ---------------------------------------------------------------------------

/// Settings for the segment recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Minimum encoded clip size in bytes; smaller clips are dropped as
    /// containing negligible audio.
    pub min_clip_bytes: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            min_clip_bytes: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings for the conversation session itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Room name requested from the token endpoint.
    pub room_name: String,
    /// Prefix for the generated participant identity (`<prefix>-<millis>`).
    pub participant_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room_name: "voice-conversation".into(),
            participant_prefix: "user".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_conversation::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote backend settings.
    pub backend: BackendConfig,
    /// Voice-activity detection settings.
    pub vad: VadConfig,
    /// Segment recorder settings.
    pub recorder: RecorderConfig,
    /// Session / room settings.
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.backend.base_url, loaded.backend.base_url);
        assert_eq!(
            original.backend.request_timeout_secs,
            loaded.backend.request_timeout_secs
        );
        assert_eq!(
            original.vad.activity_threshold,
            loaded.vad.activity_threshold
        );
        assert_eq!(original.vad.silence_window_ms, loaded.vad.silence_window_ms);
        assert_eq!(original.vad.settle_delay_ms, loaded.vad.settle_delay_ms);
        assert_eq!(original.vad.analysis_window, loaded.vad.analysis_window);
        assert_eq!(original.recorder.min_clip_bytes, loaded.recorder.min_clip_bytes);
        assert_eq!(original.session.room_name, loaded.session.room_name);
        assert_eq!(
            original.session.participant_prefix,
            loaded.session.participant_prefix
        );
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.backend.base_url, default.backend.base_url);
        assert_eq!(config.vad.silence_window_ms, default.vad.silence_window_ms);
        assert_eq!(config.recorder.min_clip_bytes, default.recorder.min_clip_bytes);
    }

    /// Verify default values match the reference behaviour.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.backend.base_url, "http://localhost:8000");
        assert_eq!(cfg.backend.request_timeout_secs, 30);
        assert!((cfg.vad.activity_threshold - 0.01).abs() < 1e-7);
        assert_eq!(cfg.vad.silence_window_ms, 2_000);
        assert_eq!(cfg.vad.settle_delay_ms, 100);
        assert_eq!(cfg.vad.analysis_window, 512);
        assert_eq!(cfg.recorder.min_clip_bytes, 10_000);
        assert_eq!(cfg.session.room_name, "voice-conversation");
        assert_eq!(cfg.session.participant_prefix, "user");
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.backend.base_url = "http://10.0.0.5:9000".into();
        cfg.backend.request_timeout_secs = 5;
        cfg.vad.activity_threshold = 0.03;
        cfg.vad.silence_window_ms = 1_500;
        cfg.recorder.min_clip_bytes = 4_096;
        cfg.session.room_name = "lab".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.backend.base_url, "http://10.0.0.5:9000");
        assert_eq!(loaded.backend.request_timeout_secs, 5);
        assert!((loaded.vad.activity_threshold - 0.03).abs() < 1e-7);
        assert_eq!(loaded.vad.silence_window_ms, 1_500);
        assert_eq!(loaded.recorder.min_clip_bytes, 4_096);
        assert_eq!(loaded.session.room_name, "lab");
    }

    /// Duration getters convert milliseconds correctly.
    #[test]
    fn vad_duration_getters() {
        let vad = VadConfig::default();
        assert_eq!(vad.silence_window(), std::time::Duration::from_secs(2));
        assert_eq!(vad.settle_delay(), std::time::Duration::from_millis(100));
    }

    /// Without the env override the configured base URL is used verbatim.
    #[test]
    fn effective_base_url_defaults_to_config() {
        // Serialised access to the process environment is not guaranteed
        // across the test binary, so only assert the fallback path when the
        // variable is absent.
        if std::env::var(BACKEND_URL_ENV).is_err() {
            let cfg = BackendConfig::default();
            assert_eq!(cfg.effective_base_url(), cfg.base_url);
        }
    }
}
