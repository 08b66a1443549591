//! Session lifecycle: controller, observable state and cancellation.
//!
//! # Architecture
//!
//! ```text
//! connect()                                   disconnect()
//!    │                                             │
//!    ├─ microphone access      ┌──────────────┐    ├─ gate.begin_disconnect
//!    ├─ /token                 │ CancelSource │◀───┤─ cancel (abandons turns)
//!    ├─ transport.connect ──▶  └──────────────┘    ├─ playback.stop
//!    ├─ enable mic track                           ├─ transport.disconnect
//!    └─ spawn listen loop + event pump             └─ clear observable state
//! ```
//!
//! The observable surface ([`SessionState`]) carries `status`, `mic_active`,
//! the transient `error`, and the latest `transcript`/`ai_response`.

pub mod cancel;
pub mod controller;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use cancel::{CancelSource, CancelToken};
pub use controller::{SessionController, SessionError};
pub use state::{
    new_shared_state, set_transient_error, SessionState, SessionStatus, SharedSessionState,
    ERROR_DISPLAY,
};
