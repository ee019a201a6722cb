// Implements a closable counting semaphore usable across threads.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::errors::{SimulationError, SimulationResult};

#[derive(Debug)]
struct SemaphoreState {
    permits: usize,
    closed: bool,
}

/// `Semaphore` is a counting semaphore whose waiters sleep on a
/// `Condvar` rather than spin.
///
/// Once [`Semaphore::close`] is called every parked and future
/// [`Semaphore::acquire`] returns [`SimulationError::ShutdownInProgress`],
/// even if permits remain. That is what lets an engine shutdown release
/// every actor parked on it.
#[derive(Debug)]
pub struct Semaphore {
    event: Condvar,
    lock: Mutex<SemaphoreState>,
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Semaphore {
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            event: Condvar::new(),
            lock: Mutex::new(SemaphoreState {
                permits,
                closed: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SemaphoreState> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a permit is available and takes it.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::ShutdownInProgress`] if the semaphore
    /// is or becomes closed before a permit is taken.
    pub fn acquire(&self) -> SimulationResult<()> {
        let mut state = self.state();
        loop {
            if state.closed {
                return Err(SimulationError::ShutdownInProgress);
            }
            if state.permits > 0 {
                state.permits -= 1;
                return Ok(());
            }
            state = self
                .event
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Takes a permit if one is immediately available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state();
        if state.closed || state.permits == 0 {
            return false;
        }
        state.permits -= 1;
        true
    }

    /// Returns one permit and wakes a single waiter.
    pub fn release(&self) {
        let mut state = self.state();
        state.permits += 1;
        drop(state);
        self.event.notify_one();
    }

    /// Closes the semaphore and wakes every waiter.
    pub fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        drop(state);
        self.event.notify_all();
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.state().permits
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}
