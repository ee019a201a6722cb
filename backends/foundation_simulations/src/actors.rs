//! Thread ownership for simulation actors.
//!
//! Every actor runs on its own named OS thread. The group keeps the
//! join handles so a shutdown can wait for each actor to leave its
//! loop instead of abandoning it.

use std::thread::{self, JoinHandle};

use crate::errors::{SimulationError, SimulationResult};

#[derive(Debug, Default)]
pub struct ActorGroup {
    handles: Vec<(String, JoinHandle<()>)>,
}

impl ActorGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `actor` on a new thread named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::ActorPanicked`] if the OS refused to
    /// create the thread.
    pub fn spawn<F>(&mut self, name: impl Into<String>, actor: F) -> SimulationResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(actor)
            .map_err(|err| SimulationError::ActorPanicked(format!("{name}: {err}")))?;
        tracing::debug!(actor = %name, "actor started");
        self.handles.push((name, handle));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Joins every actor. All threads are joined even if one panicked;
    /// the first panic is reported.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::ActorPanicked`] naming the first actor
    /// whose thread panicked.
    pub fn join_all(&mut self) -> SimulationResult<()> {
        let handles: Vec<_> = self.handles.drain(..).collect();
        Self::join_handles(handles)
    }

    /// Joins only the actors that already returned, keeping the rest.
    /// Long-lived spawners call this to avoid piling up handles.
    ///
    /// # Errors
    ///
    /// Same as [`ActorGroup::join_all`], for the finished actors.
    pub fn join_finished(&mut self) -> SimulationResult<()> {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .handles
            .drain(..)
            .partition(|(_, handle)| handle.is_finished());
        self.handles = running;
        Self::join_handles(finished)
    }

    fn join_handles(handles: Vec<(String, JoinHandle<()>)>) -> SimulationResult<()> {
        let mut first_panic = None;
        for (name, handle) in handles {
            if handle.join().is_err() {
                tracing::warn!(actor = %name, "actor panicked");
                first_panic.get_or_insert(name);
            } else {
                tracing::debug!(actor = %name, "actor joined");
            }
        }
        match first_panic {
            Some(name) => Err(SimulationError::ActorPanicked(name)),
            None => Ok(()),
        }
    }
}
