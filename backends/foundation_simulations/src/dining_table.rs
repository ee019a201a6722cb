//! Dining-philosophers engine.
//!
//! Philosopher `i` needs forks `i` and `(i + 1) % n`. Every philosopher
//! takes the lower-numbered of its two forks first (see [`fork_order`]),
//! so all actors agree on one global acquisition order and a cycle of
//! "holds one, waits for the next" can never close. No fairness is
//! promised: a hungry philosopher may lose every race for a fork for as
//! long as the scheduler keeps favouring its neighbours.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actors::ActorGroup;
use crate::config::{DelayRange, DiningConfig};
use crate::errors::{ConfigurationError, SimulationResult};
use crate::events::{EventBus, EventStream};
use crate::synca::{ForkLock, RunSignal};

pub type PhilosopherId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhilosopherState {
    Thinking,
    Hungry,
    Eating,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiningEvent {
    PhilosopherState {
        id: PhilosopherId,
        state: PhilosopherState,
    },
    ForkState {
        fork: usize,
        held: bool,
    },
}

/// Returns `(first, second)`: the forks of `philosopher` at a table of
/// `count`, lower index first.
#[must_use]
pub fn fork_order(philosopher: PhilosopherId, count: usize) -> (usize, usize) {
    let left = philosopher;
    let right = (philosopher + 1) % count;
    (left.min(right), left.max(right))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSnapshot {
    pub states: Vec<PhilosopherState>,
    pub fork_holders: Vec<Option<PhilosopherId>>,
}

#[derive(Debug)]
pub struct DiningTable {
    forks: Vec<ForkLock>,
    states: Mutex<Vec<PhilosopherState>>,
    meals: Vec<AtomicUsize>,
    signal: RunSignal,
    events: EventBus<DiningEvent>,
}

impl DiningTable {
    /// # Errors
    ///
    /// Rejects tables with fewer than two philosophers.
    pub fn new(philosophers: usize) -> SimulationResult<Self> {
        if philosophers < 2 {
            return Err(ConfigurationError::TooFewPhilosophers(philosophers).into());
        }
        Ok(Self {
            forks: (0..philosophers).map(|_| ForkLock::new()).collect(),
            states: Mutex::new(vec![PhilosopherState::Thinking; philosophers]),
            meals: (0..philosophers).map(|_| AtomicUsize::new(0)).collect(),
            signal: RunSignal::new(),
            events: EventBus::new(),
        })
    }

    // Philosopher state changes and fork releases share this lock so an
    // observer never sees a philosopher eating without both forks.
    fn states(&self) -> MutexGuard<'_, Vec<PhilosopherState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> EventStream<DiningEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn signal(&self) -> &RunSignal {
        &self.signal
    }

    #[must_use]
    pub fn philosophers(&self) -> usize {
        self.forks.len()
    }

    #[must_use]
    pub fn philosopher_states(&self) -> Vec<PhilosopherState> {
        self.states().clone()
    }

    #[must_use]
    pub fn fork_holders(&self) -> Vec<Option<PhilosopherId>> {
        self.forks.iter().map(ForkLock::holder).collect()
    }

    /// States and fork holders read in one critical section, so an
    /// eating philosopher is always seen holding both forks.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let states = self.states();
        TableSnapshot {
            states: states.clone(),
            fork_holders: self.fork_holders(),
        }
    }

    /// # Panics
    ///
    /// Panics if `philosopher` is not seated at this table.
    #[must_use]
    pub fn meals_eaten(&self, philosopher: PhilosopherId) -> usize {
        self.meals[philosopher].load(Ordering::Acquire)
    }

    #[must_use]
    pub fn total_meals(&self) -> usize {
        self.meals
            .iter()
            .map(|meals| meals.load(Ordering::Acquire))
            .sum()
    }

    fn set_state(
        &self,
        states: &mut [PhilosopherState],
        id: PhilosopherId,
        state: PhilosopherState,
    ) {
        states[id] = state;
        tracing::debug!(philosopher = id, ?state, "philosopher state changed");
        self.events
            .emit(DiningEvent::PhilosopherState { id, state });
    }

    fn take_fork(&self, id: PhilosopherId, fork: usize) -> SimulationResult<()> {
        self.forks[fork].acquire(id)?;
        let _states = self.states();
        self.events.emit(DiningEvent::ForkState { fork, held: true });
        Ok(())
    }

    fn put_fork(&self, id: PhilosopherId, fork: usize) {
        if self.forks[fork].release(id) {
            self.events.emit(DiningEvent::ForkState { fork, held: false });
        }
    }

    /// Hungry philosopher `id` picks up both forks in global order and
    /// starts eating. Returns once `id` is in the Eating state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for an `id` not seated at the table.
    /// Returns `ShutdownInProgress` if the table closes while `id` waits;
    /// any fork already taken is put back and `id` returns to Thinking.
    pub fn pick_up_forks(&self, id: PhilosopherId) -> SimulationResult<()> {
        if id >= self.philosophers() {
            return Err(ConfigurationError::UnknownPhilosopher {
                id,
                philosophers: self.philosophers(),
            }
            .into());
        }
        let (first, second) = fork_order(id, self.philosophers());
        {
            let mut states = self.states();
            self.set_state(&mut states, id, PhilosopherState::Hungry);
        }

        if let Err(err) = self.take_fork(id, first) {
            self.back_to_thinking(id, &[]);
            return Err(err);
        }
        if let Err(err) = self.take_fork(id, second) {
            self.back_to_thinking(id, &[first]);
            return Err(err);
        }

        let mut states = self.states();
        self.meals[id].fetch_add(1, Ordering::AcqRel);
        self.set_state(&mut states, id, PhilosopherState::Eating);
        Ok(())
    }

    /// Puts down both forks of `id`, second before first, and returns
    /// `id` to Thinking in the same critical section.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not seated at this table.
    pub fn put_down_forks(&self, id: PhilosopherId) {
        let (first, second) = fork_order(id, self.philosophers());
        self.back_to_thinking(id, &[second, first]);
    }

    fn back_to_thinking(&self, id: PhilosopherId, forks: &[usize]) {
        let mut states = self.states();
        for fork in forks {
            self.put_fork(id, *fork);
        }
        self.set_state(&mut states, id, PhilosopherState::Thinking);
    }

    /// Philosopher actor: `Thinking -> Hungry -> Eating -> Thinking`
    /// until shutdown.
    pub fn philosopher_cycle(
        &self,
        id: PhilosopherId,
        think: DelayRange,
        eat: DelayRange,
        rng: &mut fastrand::Rng,
    ) {
        loop {
            if self.signal.pause(think.sample(rng)).is_err() {
                break;
            }
            if self.pick_up_forks(id).is_err() {
                break;
            }
            let eaten = self.signal.pause(eat.sample(rng));
            self.put_down_forks(id);
            if eaten.is_err() {
                break;
            }
        }
        tracing::info!(philosopher = id, meals = self.meals_eaten(id), "philosopher leaving");
    }

    /// Closes every fork so hungry philosophers stop waiting; eating
    /// philosophers finish their interrupted meal and put forks down.
    pub fn shutdown(&self) {
        if self.signal.stop() {
            tracing::info!(meals = self.total_meals(), "dining table shutting down");
        }
        self.forks.iter().for_each(ForkLock::close);
    }
}

/// Runs one actor per philosopher over a [`DiningTable`].
#[derive(Debug)]
pub struct DiningSimulation {
    config: DiningConfig,
    table: Arc<DiningTable>,
    actors: ActorGroup,
}

impl DiningSimulation {
    /// # Errors
    ///
    /// Fails fast on an invalid configuration.
    pub fn new(config: DiningConfig) -> SimulationResult<Self> {
        config.validate()?;
        Ok(Self {
            table: Arc::new(DiningTable::new(config.philosophers)?),
            config,
            actors: ActorGroup::new(),
        })
    }

    #[must_use]
    pub fn table(&self) -> &Arc<DiningTable> {
        &self.table
    }

    pub fn subscribe(&self) -> EventStream<DiningEvent> {
        self.table.subscribe()
    }

    /// Spawns every philosopher.
    ///
    /// # Errors
    ///
    /// Fails if the table was already closed or a thread cannot be spawned.
    pub fn start(&mut self) -> SimulationResult<()> {
        self.table.signal().ensure_running()?;
        tracing::info!(philosophers = self.config.philosophers, "seating philosophers");

        for id in 0..self.config.philosophers {
            let table = self.table.clone();
            let think = self.config.think_delay;
            let eat = self.config.eat_delay;
            self.actors.spawn(format!("philosopher-{id}"), move || {
                table.philosopher_cycle(id, think, eat, &mut fastrand::Rng::new());
            })?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Reports an actor that panicked.
    pub fn shutdown(mut self) -> SimulationResult<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> SimulationResult<()> {
        self.table.shutdown();
        let joined = self.actors.join_all();
        self.table.events.close();
        joined
    }
}

impl Drop for DiningSimulation {
    fn drop(&mut self) {
        if let Err(err) = self.stop_and_join() {
            tracing::warn!(error = %err, "dining table shutdown on drop failed");
        }
    }
}

#[cfg(test)]
mod test_dining_table {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;
    use crate::errors::SimulationError;

    #[test]
    fn fork_order_is_lower_index_first() {
        assert_eq!(fork_order(0, 5), (0, 1));
        assert_eq!(fork_order(3, 5), (3, 4));
        // the last philosopher wraps around and reaches back for fork 0 first
        assert_eq!(fork_order(4, 5), (0, 4));
        assert_eq!(fork_order(1, 2), (0, 1));
    }

    #[test]
    fn rejects_a_single_philosopher() {
        assert!(matches!(
            DiningTable::new(1),
            Err(SimulationError::InvalidConfiguration(
                ConfigurationError::TooFewPhilosophers(1)
            ))
        ));
    }

    #[test]
    fn unknown_philosopher_cannot_pick_up_forks() {
        let table = DiningTable::new(3).expect("should build");
        let events = table.subscribe();

        assert!(matches!(
            table.pick_up_forks(3),
            Err(SimulationError::InvalidConfiguration(
                ConfigurationError::UnknownPhilosopher {
                    id: 3,
                    philosophers: 3
                }
            ))
        ));
        assert!(events.drain().is_empty());
        assert_eq!(table.fork_holders(), vec![None, None, None]);
    }

    #[test]
    #[should_panic]
    fn meals_of_an_unknown_philosopher_panics() {
        let table = DiningTable::new(2).expect("should build");
        let _ = table.meals_eaten(2);
    }

    #[test]
    fn eating_holds_both_forks_and_emits_transitions() {
        let table = DiningTable::new(3).expect("should build");
        let events = table.subscribe();

        table.pick_up_forks(2).expect("should pick up");
        assert_eq!(
            table.philosopher_states(),
            vec![
                PhilosopherState::Thinking,
                PhilosopherState::Thinking,
                PhilosopherState::Eating
            ]
        );
        assert_eq!(table.fork_holders(), vec![Some(2), None, Some(2)]);

        table.put_down_forks(2);
        assert_eq!(table.fork_holders(), vec![None, None, None]);
        assert_eq!(table.meals_eaten(2), 1);

        assert_eq!(
            events.drain(),
            vec![
                DiningEvent::PhilosopherState {
                    id: 2,
                    state: PhilosopherState::Hungry
                },
                DiningEvent::ForkState { fork: 0, held: true },
                DiningEvent::ForkState { fork: 2, held: true },
                DiningEvent::PhilosopherState {
                    id: 2,
                    state: PhilosopherState::Eating
                },
                DiningEvent::ForkState { fork: 2, held: false },
                DiningEvent::ForkState { fork: 0, held: false },
                DiningEvent::PhilosopherState {
                    id: 2,
                    state: PhilosopherState::Thinking
                },
            ]
        );
    }

    #[test]
    #[ntest::timeout(5000)]
    fn neighbour_waits_for_the_shared_fork() {
        let table = Arc::new(DiningTable::new(3).expect("should build"));
        table.pick_up_forks(0).expect("should pick up");

        let table_clone = table.clone();
        let neighbour = thread::spawn(move || table_clone.pick_up_forks(1));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(table.philosopher_states()[1], PhilosopherState::Hungry);
        assert_eq!(table.fork_holders()[1], Some(0));

        table.put_down_forks(0);
        neighbour
            .join()
            .expect("should safely join")
            .expect("neighbour should eat");
        assert_eq!(table.philosopher_states()[1], PhilosopherState::Eating);
    }

    #[test]
    #[ntest::timeout(5000)]
    fn shutdown_sends_hungry_philosophers_back_to_thinking() {
        let table = Arc::new(DiningTable::new(2).expect("should build"));
        table.pick_up_forks(0).expect("should pick up");

        let table_clone = table.clone();
        let hungry = thread::spawn(move || table_clone.pick_up_forks(1));

        thread::sleep(Duration::from_millis(50));
        table.shutdown();

        let result = hungry.join().expect("should safely join");
        assert!(result.is_err_and(|err| err.is_shutdown()));
        assert_eq!(table.philosopher_states()[1], PhilosopherState::Thinking);

        table.put_down_forks(0);
        assert_eq!(table.fork_holders(), vec![None, None]);
    }

    #[test]
    #[ntest::timeout(10000)]
    fn simulation_keeps_every_philosopher_fed() {
        let config = DiningConfig::default()
            .with_philosophers(4)
            .with_think_delay(DelayRange::from_millis(0, 1))
            .with_eat_delay(DelayRange::from_millis(0, 1));
        let mut simulation = DiningSimulation::new(config).expect("should build");
        simulation.start().expect("should start");

        thread::sleep(Duration::from_millis(200));
        let table = simulation.table().clone();
        simulation.shutdown().expect("should shut down");

        assert!(table.total_meals() > 0);
        assert!(table
            .philosopher_states()
            .iter()
            .all(|state| *state == PhilosopherState::Thinking));
        assert!(table.fork_holders().iter().all(Option::is_none));
    }
}
