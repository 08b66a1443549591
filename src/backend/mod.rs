//! Remote conversation backend.
//!
//! This module provides:
//! * [`ConversationBackend`] — async trait over the three-endpoint contract.
//! * [`HttpBackend`] — reqwest implementation (`/token`, `/transcribe`,
//!   `/respond`).
//! * [`TokenGrant`] / [`AiReply`] — wire types.
//! * [`BackendError`] — per-endpoint error variants.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_conversation::backend::{ConversationBackend, HttpBackend};
//! use voice_conversation::config::BackendConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = HttpBackend::from_config(&BackendConfig::default());
//!     let grant = backend.fetch_token("voice-conversation", "user-1").await.unwrap();
//!     println!("transport at {}", grant.url);
//! }
//! ```

pub mod client;

pub use client::{AiReply, BackendError, ConversationBackend, HttpBackend, TokenGrant};

// test-only re-export so other test modules can import MockBackend without
// `use voice_conversation::backend::client::MockBackend`.
#[cfg(test)]
pub use client::MockBackend;
