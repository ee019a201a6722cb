// Implements an exclusive resource that remembers who holds it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::errors::{SimulationError, SimulationResult};

#[derive(Debug)]
struct ForkState {
    holder: Option<usize>,
    closed: bool,
}

/// `ForkLock` is a mutual exclusion lock whose owner is tracked as
/// data, so occupancy can be read by observers and asserted by tests.
#[derive(Debug)]
pub struct ForkLock {
    event: Condvar,
    lock: Mutex<ForkState>,
}

impl Default for ForkLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ForkLock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            event: Condvar::new(),
            lock: Mutex::new(ForkState {
                holder: None,
                closed: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ForkState> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the fork is free, then records `holder` as owner.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::ShutdownInProgress`] once the fork
    /// has been closed.
    pub fn acquire(&self, holder: usize) -> SimulationResult<()> {
        let mut state = self.state();
        loop {
            if state.closed {
                return Err(SimulationError::ShutdownInProgress);
            }
            if state.holder.is_none() {
                state.holder = Some(holder);
                return Ok(());
            }
            state = self
                .event
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Releases the fork if `holder` owns it. Returns false otherwise.
    pub fn release(&self, holder: usize) -> bool {
        let mut state = self.state();
        if state.holder != Some(holder) {
            tracing::warn!(holder, owner = ?state.holder, "release of fork not held");
            return false;
        }
        state.holder = None;
        drop(state);
        self.event.notify_one();
        true
    }

    #[must_use]
    pub fn holder(&self) -> Option<usize> {
        self.state().holder
    }

    /// Closes the fork, waking every philosopher waiting on it.
    /// A current holder keeps the fork until it releases it.
    pub fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        drop(state);
        self.event.notify_all();
    }
}
