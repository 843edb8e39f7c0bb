//! Cooperative cancellation.
//!
//! A [`Shutdown`] token is cloned into every part of the relay that can
//! wait. Cancelling it sets a flag and closes a channel, so every pending
//! [`Shutdown::sleep`] wakes at once instead of running out its timer.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Shared {
    cancelled: AtomicBool,
    /// Dropped on cancel, which disconnects every receiver.
    trigger: Mutex<Option<Sender<()>>>,
}

/// Cloneable cancellation token.
#[derive(Clone)]
pub struct Shutdown {
    shared: Arc<Shared>,
    wake: Receiver<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            shared: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(sender)),
            }),
            wake: receiver,
        }
    }

    /// Request shutdown. Idempotent.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.shared.trigger.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for `duration` or until cancelled.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the wait was
    /// cut short (or never started) because of cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }

        match self.wake.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => !self.is_cancelled(),
            // Nothing is ever sent; any wake-up is the trigger dropping.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
