//! Cancellation token for one connected session.
//!
//! Every network call and the microphone listen loop run under a
//! `tokio::select!` arm on [`CancelToken::cancelled`], so disconnecting
//! actively abandons in-flight work at its next suspension point instead of
//! letting stale results apply state updates after teardown.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

struct Shared {
    cancelled: AtomicBool,
    notify: Notify,
}

/// The cancelling side, owned by the session controller.
pub struct CancelSource {
    shared: Arc<Shared>,
}

/// The observing side, cloned into every task of one session.
#[derive(Clone)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl CancelSource {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// A token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Cancel: wakes every waiter, current and future.  Idempotent.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the source has been cancelled.
    ///
    /// Registration happens before the flag re-check, so a cancel that races
    /// with this call cannot be missed.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let mut notified = pin!(self.shared.notify.notified());
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
