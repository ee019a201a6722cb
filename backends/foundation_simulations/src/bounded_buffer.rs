//! Bounded-buffer producer/consumer engine.
//!
//! A fixed ring of slots guarded by a mutex, gated by two counting
//! semaphores: `empty_slots` starts at the capacity and holds producers
//! back when the ring is full, `filled_slots` starts at zero and holds
//! consumers back when it is empty. Index advancement happens under the
//! mutex, so items leave in exactly the order they entered.

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actors::ActorGroup;
use crate::config::{BufferConfig, DelayRange};
use crate::errors::{ConfigurationError, SimulationResult};
use crate::events::{EventBus, EventStream};
use crate::synca::{RunSignal, Semaphore};

/// What a producer or consumer actor is doing right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorActivity {
    /// Parked on a semaphore.
    Waiting,
    Working,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferEvent {
    SlotFilled { index: usize, label: String },
    SlotEmptied { index: usize },
    Producer(ActorActivity),
    Consumer(ActorActivity),
}

/// Item produced by the simulation's producer actor, shown as `#serial`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Item(pub u64);

impl Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Ring<T> {
    slots: Vec<Option<T>>,
    write_index: usize,
    read_index: usize,
}

impl<T> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            write_index: 0,
            read_index: 0,
        }
    }

    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }
}

pub struct BoundedBuffer<T> {
    ring: Mutex<Ring<T>>,
    empty_slots: Semaphore,
    filled_slots: Semaphore,
    signal: RunSignal,
    events: EventBus<BufferEvent>,
    produced: AtomicUsize,
    consumed: AtomicUsize,
}

impl<T> core::fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("capacity", &self.capacity())
            .field("occupied", &self.occupied())
            .field("produced", &self.produced())
            .field("consumed", &self.consumed())
            .finish_non_exhaustive()
    }
}

impl<T> BoundedBuffer<T> {
    /// # Errors
    ///
    /// Rejects a zero capacity.
    pub fn new(capacity: usize) -> SimulationResult<Self> {
        if capacity == 0 {
            return Err(ConfigurationError::ZeroCapacity.into());
        }
        Ok(Self {
            ring: Mutex::new(Ring::new(capacity)),
            empty_slots: Semaphore::new(capacity),
            filled_slots: Semaphore::new(0),
            signal: RunSignal::new(),
            events: EventBus::new(),
            produced: AtomicUsize::new(0),
            consumed: AtomicUsize::new(0),
        })
    }

    fn ring(&self) -> MutexGuard<'_, Ring<T>> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> EventStream<BufferEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn signal(&self) -> &RunSignal {
        &self.signal
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring().slots.len()
    }

    /// Number of slots currently holding an unread item.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.ring().slots.iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn produced(&self) -> usize {
        self.produced.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn consumed(&self) -> usize {
        self.consumed.load(Ordering::Acquire)
    }

    /// Consumes the next item in production order, blocking while the
    /// buffer is empty. Emits [`BufferEvent::SlotEmptied`].
    ///
    /// # Errors
    ///
    /// Returns `ShutdownInProgress` once [`BoundedBuffer::shutdown`] has
    /// been called, including when the caller was already parked.
    ///
    /// # Panics
    ///
    /// Panics if a filled-slot permit was granted for an empty slot,
    /// which the semaphore pairing rules out.
    pub fn consume(&self) -> SimulationResult<T> {
        self.signal.ensure_running()?;
        self.filled_slots.acquire()?;

        let mut ring = self.ring();
        let index = ring.read_index;
        let item = ring.slots[index]
            .take()
            .expect("filled slot permit was granted for an empty slot");
        ring.read_index = ring.advance(index);
        self.consumed.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(slot = index, "slot emptied");
        self.events.emit(BufferEvent::SlotEmptied { index });
        drop(ring);

        self.empty_slots.release();
        Ok(item)
    }

    /// Requests shutdown: every parked producer and consumer returns
    /// `ShutdownInProgress`, as does every later call.
    pub fn shutdown(&self) {
        if self.signal.stop() {
            tracing::info!(
                produced = self.produced(),
                consumed = self.consumed(),
                "bounded buffer shutting down"
            );
        }
        self.empty_slots.close();
        self.filled_slots.close();
    }
}

impl<T: Display> BoundedBuffer<T> {
    /// Appends `item` at the write index, blocking while every slot is
    /// full. Emits [`BufferEvent::SlotFilled`] and returns the slot used.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownInProgress` once [`BoundedBuffer::shutdown`] has
    /// been called, including when the caller was already parked.
    pub fn produce(&self, item: T) -> SimulationResult<usize> {
        self.signal.ensure_running()?;
        self.empty_slots.acquire()?;

        let mut ring = self.ring();
        let index = ring.write_index;
        debug_assert!(ring.slots[index].is_none(), "producer overwrote slot {index}");
        let label = item.to_string();
        ring.slots[index] = Some(item);
        ring.write_index = ring.advance(index);
        self.produced.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(slot = index, item = %label, "slot filled");
        self.events.emit(BufferEvent::SlotFilled { index, label });
        drop(ring);

        self.filled_slots.release();
        Ok(index)
    }
}

impl<T: Clone> BoundedBuffer<T> {
    #[must_use]
    pub fn slots_snapshot(&self) -> Vec<Option<T>> {
        self.ring().slots.clone()
    }
}

impl BoundedBuffer<Item> {
    /// Producer actor: labels items `#1, #2, …` and pauses for a sampled
    /// production delay after each one, until shutdown.
    pub fn producer_cycle(&self, delay: DelayRange, rng: &mut fastrand::Rng) {
        let mut serial = 1;
        loop {
            self.events.emit(BufferEvent::Producer(ActorActivity::Waiting));
            if self.produce(Item(serial)).is_err() {
                break;
            }
            self.events.emit(BufferEvent::Producer(ActorActivity::Working));
            serial += 1;

            if self.signal.pause(delay.sample(rng)).is_err() {
                break;
            }
        }
        tracing::info!(produced = serial - 1, "producer leaving");
    }

    /// Consumer actor: takes items and pauses for a sampled consumption
    /// delay after each one, until shutdown.
    pub fn consumer_cycle(&self, delay: DelayRange, rng: &mut fastrand::Rng) {
        let mut taken = 0_usize;
        loop {
            self.events.emit(BufferEvent::Consumer(ActorActivity::Waiting));
            let Ok(item) = self.consume() else {
                break;
            };
            self.events.emit(BufferEvent::Consumer(ActorActivity::Working));
            tracing::debug!(item = %item, "consumer processing");
            taken += 1;

            if self.signal.pause(delay.sample(rng)).is_err() {
                break;
            }
        }
        tracing::info!(consumed = taken, "consumer leaving");
    }
}

/// Runs one producer and one consumer actor over a [`BoundedBuffer`].
#[derive(Debug)]
pub struct ProducerConsumerSimulation {
    config: BufferConfig,
    buffer: Arc<BoundedBuffer<Item>>,
    actors: ActorGroup,
}

impl ProducerConsumerSimulation {
    /// Builds the engine without starting any actor, so observers can
    /// subscribe before the first event.
    ///
    /// # Errors
    ///
    /// Fails fast on an invalid configuration.
    pub fn new(config: BufferConfig) -> SimulationResult<Self> {
        config.validate()?;
        Ok(Self {
            buffer: Arc::new(BoundedBuffer::new(config.capacity)?),
            config,
            actors: ActorGroup::new(),
        })
    }

    #[must_use]
    pub fn buffer(&self) -> &Arc<BoundedBuffer<Item>> {
        &self.buffer
    }

    pub fn subscribe(&self) -> EventStream<BufferEvent> {
        self.buffer.subscribe()
    }

    /// Spawns the producer and consumer threads.
    ///
    /// # Errors
    ///
    /// Fails if the engine was already shut down or a thread cannot be
    /// spawned.
    pub fn start(&mut self) -> SimulationResult<()> {
        self.buffer.signal().ensure_running()?;
        tracing::info!(capacity = self.config.capacity, "starting producer/consumer");

        let buffer = self.buffer.clone();
        let delay = self.config.produce_delay;
        self.actors.spawn("producer", move || {
            buffer.producer_cycle(delay, &mut fastrand::Rng::new());
        })?;

        let buffer = self.buffer.clone();
        let delay = self.config.consume_delay;
        self.actors.spawn("consumer", move || {
            buffer.consumer_cycle(delay, &mut fastrand::Rng::new());
        })
    }

    /// Stops the engine, joins both actors and closes the event streams.
    ///
    /// # Errors
    ///
    /// Reports an actor that panicked.
    pub fn shutdown(mut self) -> SimulationResult<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> SimulationResult<()> {
        self.buffer.shutdown();
        let joined = self.actors.join_all();
        self.buffer.events.close();
        joined
    }
}

impl Drop for ProducerConsumerSimulation {
    fn drop(&mut self) {
        if let Err(err) = self.stop_and_join() {
            tracing::warn!(error = %err, "producer/consumer shutdown on drop failed");
        }
    }
}
