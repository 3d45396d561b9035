//! Cancellation signal shared between a loader's stop path and the
//! provider queries it has in flight.
//!
//! Cancelling is idempotent and safe from any thread. Providers poll the
//! signal between units of work; nothing is aborted forcibly.

use crate::error::ScourError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the signal cancelled. Every clone observes the change.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns `Err(ScourError::Cancelled)` once cancelled, for use with `?`
    /// inside provider loops.
    #[inline]
    pub fn throw_if_cancelled(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(ScourError::Cancelled)
        } else {
            Ok(())
        }
    }
}
