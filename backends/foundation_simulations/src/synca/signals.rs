// Implements the liveness signal shared by every actor of an engine.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::errors::{SimulationError, SimulationResult};

/// `RunState` is the lifecycle of an engine as seen by its actors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
}

/// `RunSignal` is the "still running" flag actors poll at each safe
/// suspension point.
///
/// It doubles as the sleeper for simulated work: [`RunSignal::pause`]
/// waits on the signal's `Condvar` so a stop interrupts any delay in
/// progress instead of letting it run to completion.
#[derive(Debug)]
pub struct RunSignal {
    event: Condvar,
    lock: Mutex<RunState>,
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            event: Condvar::new(),
            lock: Mutex::new(RunState::Running),
        }
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn probe(&self) -> RunState {
        *self.state()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.probe() == RunState::Running
    }

    /// `ensure_running` turns a stopped signal into
    /// [`SimulationError::ShutdownInProgress`].
    ///
    /// # Errors
    ///
    /// Fails once [`RunSignal::stop`] has been called.
    pub fn ensure_running(&self) -> SimulationResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SimulationError::ShutdownInProgress)
        }
    }

    /// Flips the signal to stopped and wakes every pausing actor.
    ///
    /// Returns true only for the call that performed the transition.
    pub fn stop(&self) -> bool {
        let mut state = self.state();
        if *state == RunState::Stopped {
            return false;
        }
        *state = RunState::Stopped;
        drop(state);
        self.event.notify_all();
        true
    }

    /// Sleeps for `duration` unless the signal is stopped first.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::ShutdownInProgress`] when the signal
    /// is stopped before or during the pause.
    pub fn pause(&self, duration: Duration) -> SimulationResult<()> {
        // no representable deadline means the pause only ends on stop
        let deadline = Instant::now().checked_add(duration);
        let mut state = self.state();
        loop {
            if *state == RunState::Stopped {
                return Err(SimulationError::ShutdownInProgress);
            }
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    self.event
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .event
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}
