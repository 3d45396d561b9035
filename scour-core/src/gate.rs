//! Countdown gate: blocks a waiter until N independent signals have each
//! fired once.
//!
//! Every per-root query task holds a [`CountdownGuard`] for the duration of
//! its body. The guard counts down on drop, so success, an empty result and
//! a panicking fetch all release the gate exactly once.

use crate::error::ScourError;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct GateState {
    remaining: usize,
    interrupted: bool,
}

#[derive(Debug)]
pub struct CountdownGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl CountdownGate {
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(GateState {
                remaining: count,
                interrupted: false,
            }),
            cond: Condvar::new(),
        }
    }

    // Counting down must never fail, so a poisoned lock is recovered.
    fn lock_state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decrements the count, waking waiters when it reaches zero.
    /// Extra calls past zero are ignored.
    pub fn count_down(&self) {
        let mut state = self.lock_state();
        if state.remaining == 0 {
            return;
        }
        state.remaining -= 1;
        if state.remaining == 0 {
            self.cond.notify_all();
        }
    }

    pub fn remaining(&self) -> usize {
        self.lock_state().remaining
    }

    /// Interrupts current and future waiters. Outstanding count-downs still
    /// land normally.
    pub fn interrupt(&self) {
        let mut state = self.lock_state();
        state.interrupted = true;
        self.cond.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.lock_state().interrupted
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) -> crate::Result<()> {
        let guard = self.state.lock().map_err(|_| ScourError::Interrupted)?;
        let state = self
            .cond
            .wait_while(guard, |s| s.remaining > 0 && !s.interrupted)
            .map_err(|_| ScourError::Interrupted)?;
        if state.interrupted {
            return Err(ScourError::Interrupted);
        }
        Ok(())
    }

    /// Blocks until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `Ok(true)` when every signal fired and `Ok(false)` on timeout.
    /// A timeout is not an error.
    pub fn wait_timeout(&self, timeout: Duration) -> crate::Result<bool> {
        let guard = self.state.lock().map_err(|_| ScourError::Interrupted)?;
        let (state, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |s| s.remaining > 0 && !s.interrupted)
            .map_err(|_| ScourError::Interrupted)?;
        if state.interrupted {
            return Err(ScourError::Interrupted);
        }
        Ok(state.remaining == 0)
    }

    /// Returns a guard that counts this gate down once when dropped.
    pub fn guard(self: &Arc<Self>) -> CountdownGuard {
        CountdownGuard {
            gate: Arc::clone(self),
        }
    }
}

/// Counts its gate down exactly once, on drop.
#[derive(Debug)]
pub struct CountdownGuard {
    gate: Arc<CountdownGate>,
}

impl Drop for CountdownGuard {
    fn drop(&mut self) {
        self.gate.count_down();
    }
}
