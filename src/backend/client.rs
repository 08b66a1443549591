//! Core `ConversationBackend` trait and `HttpBackend` implementation.
//!
//! The backend exposes three endpoints: `/token` issues a transport
//! credential, `/transcribe` turns an utterance clip into text, and
//! `/respond` turns text into an AI reply with optional synthesized speech.
//! All connection details come from [`BackendConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use thiserror::Error;

use crate::audio::AudioSegment;
use crate::config::BackendConfig;

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Errors from the three backend endpoints.
///
/// Each endpoint maps every failure — transport-level or non-2xx — into its
/// own variant so the session can surface the right error kind.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// `/token` failed; the connection attempt is aborted.
    #[error("failed to get token: {0}")]
    Token(String),

    /// `/transcribe` failed.
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// `/respond` failed.
    #[error("response failed: {0}")]
    Response(String),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Successful `/token` response: credential plus transport URL.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub url: String,
}

/// Successful `/respond` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AiReply {
    /// The AI's text reply.
    pub response_text: String,
    /// Base64-encoded synthesized speech, when the backend produced any.
    pub audio: Option<String>,
}

impl AiReply {
    /// The speech payload, treating a missing *or empty* field as absent —
    /// the backend sends `"audio": ""` for turns it declined to voice.
    pub fn speech(&self) -> Option<&str> {
        self.audio.as_deref().filter(|a| !a.is_empty())
    }
}

// ---------------------------------------------------------------------------
// ConversationBackend trait
// ---------------------------------------------------------------------------

/// Async interface to the remote conversation service.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn ConversationBackend>`).
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Request a transport session credential.
    async fn fetch_token(
        &self,
        room_name: &str,
        participant_name: &str,
    ) -> Result<TokenGrant, BackendError>;

    /// Transcribe one utterance clip to text.
    ///
    /// The returned text may be empty — the caller decides whether it
    /// constitutes speech.
    async fn transcribe(&self, segment: &AudioSegment) -> Result<String, BackendError>;

    /// Produce the AI reply (text plus optional speech) for a transcript.
    async fn respond(&self, text: &str) -> Result<AiReply, BackendError>;
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// Production backend speaking the three-endpoint HTTP contract.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Build an `HttpBackend` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.request_timeout_secs`.  A default (no-timeout) client is used
    /// as a last-resort fallback if the builder fails (should never happen
    /// in practice).
    pub fn from_config(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.effective_base_url().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL the client was built with (env override already applied).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Render a non-success response as `"<status>: <body>"` for error strings.
async fn status_detail(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("{status}: {body}")
}

#[async_trait]
impl ConversationBackend for HttpBackend {
    async fn fetch_token(
        &self,
        room_name: &str,
        participant_name: &str,
    ) -> Result<TokenGrant, BackendError> {
        let url = format!("{}/token", self.base_url);
        let body = serde_json::json!({
            "room_name": room_name,
            "participant_name": participant_name,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Token(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BackendError::Token(status_detail(resp).await));
        }

        let grant: TokenGrant = resp
            .json()
            .await
            .map_err(|e| BackendError::Token(e.to_string()))?;

        if grant.token.is_empty() || grant.url.is_empty() {
            return Err(BackendError::Token("invalid response from server".into()));
        }

        Ok(grant)
    }

    async fn transcribe(&self, segment: &AudioSegment) -> Result<String, BackendError> {
        let url = format!("{}/transcribe", self.base_url);
        log::debug!(
            "backend: uploading {}-byte clip ({})",
            segment.len(),
            segment.mime_type
        );

        let part = multipart::Part::bytes(segment.bytes.clone())
            .file_name("utterance.wav")
            .mime_str(segment.mime_type)
            .map_err(|e| BackendError::Transcription(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::Transcription(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BackendError::Transcription(status_detail(resp).await));
        }

        #[derive(Deserialize)]
        struct Transcript {
            text: String,
        }

        let transcript: Transcript = resp
            .json()
            .await
            .map_err(|e| BackendError::Transcription(e.to_string()))?;

        Ok(transcript.text)
    }

    async fn respond(&self, text: &str) -> Result<AiReply, BackendError> {
        let url = format!("{}/respond", self.base_url);
        let body = serde_json::json!({ "text": text });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Response(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BackendError::Response(status_detail(resp).await));
        }

        resp.json()
            .await
            .map_err(|e| BackendError::Response(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MockBackend  (test-only)
// ---------------------------------------------------------------------------

/// A test double with scripted endpoint results and call counters.
#[cfg(test)]
pub struct MockBackend {
    token: Result<TokenGrant, BackendError>,
    transcript: Result<String, BackendError>,
    reply: Result<AiReply, BackendError>,
    transcribe_calls: std::sync::atomic::AtomicUsize,
    respond_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockBackend {
    /// A backend whose every endpoint succeeds with plain defaults.
    pub fn new() -> Self {
        Self {
            token: Ok(TokenGrant {
                token: "jwt".into(),
                url: "ws://localhost:7880".into(),
            }),
            transcript: Ok("hello there".into()),
            reply: Ok(AiReply {
                response_text: "hi, how can I help?".into(),
                audio: None,
            }),
            transcribe_calls: std::sync::atomic::AtomicUsize::new(0),
            respond_calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_token(mut self, token: Result<TokenGrant, BackendError>) -> Self {
        self.token = token;
        self
    }

    pub fn with_transcript(mut self, transcript: Result<String, BackendError>) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn with_reply(mut self, reply: Result<AiReply, BackendError>) -> Self {
        self.reply = reply;
        self
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_calls
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn respond_calls(&self) -> usize {
        self.respond_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl ConversationBackend for MockBackend {
    async fn fetch_token(
        &self,
        _room_name: &str,
        _participant_name: &str,
    ) -> Result<TokenGrant, BackendError> {
        self.token.clone()
    }

    async fn transcribe(&self, _segment: &AudioSegment) -> Result<String, BackendError> {
        self.transcribe_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.transcript.clone()
    }

    async fn respond(&self, _text: &str) -> Result<AiReply, BackendError> {
        self.respond_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.reply.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
