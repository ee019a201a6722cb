//! Sleeping-barber engine.
//!
//! Customers take a numbered seat in a bounded waiting room and queue in
//! arrival order. Two one-to-one signals form the rendezvous: the shared
//! `customer_ready` semaphore tells the barber someone is waiting, and
//! each seated customer holds a private ticket semaphore that only the
//! barber releases, once, after taking that customer off the queue. A
//! wake-up therefore can never reach the wrong customer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actors::ActorGroup;
use crate::config::{BarbershopConfig, DelayRange};
use crate::errors::{ConfigurationError, SimulationError, SimulationResult};
use crate::events::{EventBus, EventStream};
use crate::synca::{RunSignal, Semaphore};

pub type CustomerId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarberState {
    Sleeping,
    Cutting,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BarbershopEvent {
    CustomerArrived(CustomerId),
    CustomerWaiting { id: CustomerId, seat: usize },
    CustomerTurnedAway(CustomerId),
    SeatFreed { seat: usize },
    BarberState(BarberState),
    CustomerServed(CustomerId),
}

/// Final answer to a customer's visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Seated,
    TurnedAway,
}

/// Immediate answer to an arrival, before any rendezvous wait.
#[derive(Debug)]
pub enum Arrival {
    Seated(SeatTicket),
    TurnedAway,
}

impl Arrival {
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Seated(_) => Outcome::Seated,
            Self::TurnedAway => Outcome::TurnedAway,
        }
    }
}

/// Held by a seated customer until the barber calls them.
#[derive(Debug)]
pub struct SeatTicket {
    id: CustomerId,
    seat: usize,
    ready: Arc<Semaphore>,
}

impl SeatTicket {
    #[must_use]
    pub fn id(&self) -> CustomerId {
        self.id
    }

    #[must_use]
    pub fn seat(&self) -> usize {
        self.seat
    }

    /// Blocks outside the waiting-room lock until the barber takes this
    /// customer.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownInProgress` if the shop closes first.
    pub fn wait_for_barber(self) -> SimulationResult<()> {
        self.ready.acquire()
    }
}

#[derive(Debug)]
struct WaitingCustomer {
    id: CustomerId,
    seat: usize,
    ready: Arc<Semaphore>,
}

#[derive(Debug)]
struct WaitingRoom {
    seats: Vec<Option<CustomerId>>,
    queue: VecDeque<WaitingCustomer>,
    barber: BarberState,
}

#[derive(Debug)]
pub struct Barbershop {
    room: Mutex<WaitingRoom>,
    customer_ready: Semaphore,
    signal: RunSignal,
    events: EventBus<BarbershopEvent>,
    served: AtomicUsize,
    turned_away: AtomicUsize,
}

impl Barbershop {
    /// # Errors
    ///
    /// Rejects a waiting room without seats.
    pub fn new(waiting_seats: usize) -> SimulationResult<Self> {
        if waiting_seats == 0 {
            return Err(ConfigurationError::ZeroCapacity.into());
        }
        Ok(Self {
            room: Mutex::new(WaitingRoom {
                seats: vec![None; waiting_seats],
                queue: VecDeque::with_capacity(waiting_seats),
                barber: BarberState::Sleeping,
            }),
            customer_ready: Semaphore::new(0),
            signal: RunSignal::new(),
            events: EventBus::new(),
            served: AtomicUsize::new(0),
            turned_away: AtomicUsize::new(0),
        })
    }

    fn room(&self) -> MutexGuard<'_, WaitingRoom> {
        self.room.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> EventStream<BarbershopEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn signal(&self) -> &RunSignal {
        &self.signal
    }

    #[must_use]
    pub fn waiting_capacity(&self) -> usize {
        self.room().seats.len()
    }

    /// Waiting customers, oldest first.
    #[must_use]
    pub fn waiting(&self) -> Vec<CustomerId> {
        self.room().queue.iter().map(|customer| customer.id).collect()
    }

    #[must_use]
    pub fn seats_snapshot(&self) -> Vec<Option<CustomerId>> {
        self.room().seats.clone()
    }

    #[must_use]
    pub fn barber_state(&self) -> BarberState {
        self.room().barber
    }

    #[must_use]
    pub fn served(&self) -> usize {
        self.served.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn turned_away(&self) -> usize {
        self.turned_away.load(Ordering::Acquire)
    }

    /// Seats customer `id` in the lowest free seat if the waiting room
    /// has room, otherwise turns them away without touching the queue.
    /// Never blocks.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownInProgress` once the shop is closing.
    pub fn arrive(&self, id: CustomerId) -> SimulationResult<Arrival> {
        self.events.emit(BarbershopEvent::CustomerArrived(id));

        let mut room = self.room();
        // checked under the room lock so shutdown's drain cannot miss a seat
        self.signal.ensure_running()?;

        let free_seat = room.seats.iter().position(Option::is_none);
        let seat = match free_seat {
            Some(seat) if room.queue.len() < room.seats.len() => seat,
            _ => {
                drop(room);
                self.turned_away.fetch_add(1, Ordering::AcqRel);
                tracing::debug!(customer = id, "waiting room full, customer turned away");
                self.events.emit(BarbershopEvent::CustomerTurnedAway(id));
                return Ok(Arrival::TurnedAway);
            }
        };

        let ready = Arc::new(Semaphore::new(0));
        room.seats[seat] = Some(id);
        room.queue.push_back(WaitingCustomer {
            id,
            seat,
            ready: ready.clone(),
        });
        tracing::debug!(customer = id, seat, waiting = room.queue.len(), "customer seated");
        self.events.emit(BarbershopEvent::CustomerWaiting { id, seat });
        drop(room);

        self.customer_ready.release();
        Ok(Arrival::Seated(SeatTicket { id, seat, ready }))
    }

    /// Full customer visit: arrive, and if seated, wait for the barber.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownInProgress` if the shop closes before a seated
    /// customer is called.
    pub fn customer_arrives(&self, id: CustomerId) -> SimulationResult<Outcome> {
        match self.arrive(id)? {
            Arrival::Seated(ticket) => {
                ticket.wait_for_barber()?;
                tracing::debug!(customer = id, "customer in the barber chair");
                Ok(Outcome::Seated)
            }
            Arrival::TurnedAway => Ok(Outcome::TurnedAway),
        }
    }

    /// Sleeps until a customer is ready, then takes the oldest waiting
    /// customer, frees their seat, switches to cutting and releases that
    /// customer's ticket. Returns the customer taken.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownInProgress` once the shop is closing.
    pub fn call_next_customer(&self) -> SimulationResult<CustomerId> {
        self.customer_ready.acquire()?;

        let mut room = self.room();
        let Some(customer) = room.queue.pop_front() else {
            // only reachable when shutdown drained the queue after our permit
            return Err(SimulationError::ShutdownInProgress);
        };
        room.seats[customer.seat] = None;
        room.barber = BarberState::Cutting;
        tracing::debug!(
            customer = customer.id,
            seat = customer.seat,
            waiting = room.queue.len(),
            "barber woke up"
        );
        self.events.emit(BarbershopEvent::SeatFreed {
            seat: customer.seat,
        });
        self.events
            .emit(BarbershopEvent::BarberState(BarberState::Cutting));
        drop(room);

        customer.ready.release();
        Ok(customer.id)
    }

    /// Marks the haircut of `id` complete and puts the barber back to sleep.
    pub fn finish_service(&self, id: CustomerId) {
        let mut room = self.room();
        room.barber = BarberState::Sleeping;
        self.served.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(customer = id, "haircut finished");
        self.events.emit(BarbershopEvent::CustomerServed(id));
        self.events
            .emit(BarbershopEvent::BarberState(BarberState::Sleeping));
    }

    /// Barber actor: `Sleeping -> Cutting -> Sleeping` until shutdown.
    /// A cut interrupted by shutdown ends in `Sleeping` without a
    /// `CustomerServed` event.
    pub fn barber_cycle(&self, cut: DelayRange, rng: &mut fastrand::Rng) {
        self.events
            .emit(BarbershopEvent::BarberState(BarberState::Sleeping));
        loop {
            let Ok(id) = self.call_next_customer() else {
                break;
            };
            if self.signal.pause(cut.sample(rng)).is_err() {
                tracing::debug!(customer = id, "haircut interrupted by shutdown");
                let mut room = self.room();
                room.barber = BarberState::Sleeping;
                self.events
                    .emit(BarbershopEvent::BarberState(BarberState::Sleeping));
                break;
            }
            self.finish_service(id);
        }
        tracing::info!(served = self.served(), "barber leaving");
    }

    /// Arrival generator: sends customers `1, 2, …` spaced by `gap`, one
    /// thread each, until shutdown; then joins every customer thread.
    pub fn arrival_cycle(self: &Arc<Self>, gap: DelayRange, rng: &mut fastrand::Rng) {
        let mut customers = ActorGroup::new();
        let mut next_id: CustomerId = 1;

        while self.signal.pause(gap.sample(rng)).is_ok() {
            let id = next_id;
            next_id += 1;

            let shop = self.clone();
            let spawned = customers.spawn(format!("customer-{id}"), move || {
                match shop.customer_arrives(id) {
                    Ok(outcome) => {
                        tracing::debug!(customer = id, ?outcome, "customer leaving");
                    }
                    Err(err) => {
                        tracing::debug!(customer = id, error = %err, "customer sent home");
                    }
                }
            });
            if let Err(err) = spawned {
                tracing::warn!(customer = id, error = %err, "failed to spawn customer");
            }
            // panics are already logged by the group
            let _ = customers.join_finished();
        }

        let _ = customers.join_all();
        tracing::info!(arrivals = next_id - 1, "arrival generator leaving");
    }

    /// Closes the shop: the barber and every seated customer unblock with
    /// `ShutdownInProgress` and later arrivals are refused.
    pub fn shutdown(&self) {
        if self.signal.stop() {
            tracing::info!(
                served = self.served(),
                turned_away = self.turned_away(),
                "barbershop shutting down"
            );
        }
        self.customer_ready.close();

        let mut room = self.room();
        for customer in room.queue.drain(..) {
            customer.ready.close();
        }
        room.seats.iter_mut().for_each(|seat| *seat = None);
    }
}

/// Runs the barber and the arrival generator over a [`Barbershop`].
#[derive(Debug)]
pub struct BarbershopSimulation {
    config: BarbershopConfig,
    shop: Arc<Barbershop>,
    actors: ActorGroup,
}

impl BarbershopSimulation {
    /// # Errors
    ///
    /// Fails fast on an invalid configuration.
    pub fn new(config: BarbershopConfig) -> SimulationResult<Self> {
        config.validate()?;
        Ok(Self {
            shop: Arc::new(Barbershop::new(config.waiting_seats)?),
            config,
            actors: ActorGroup::new(),
        })
    }

    #[must_use]
    pub fn shop(&self) -> &Arc<Barbershop> {
        &self.shop
    }

    pub fn subscribe(&self) -> EventStream<BarbershopEvent> {
        self.shop.subscribe()
    }

    /// Spawns the barber and the arrival generator.
    ///
    /// # Errors
    ///
    /// Fails if the shop was already closed or a thread cannot be spawned.
    pub fn start(&mut self) -> SimulationResult<()> {
        self.shop.signal().ensure_running()?;
        tracing::info!(seats = self.config.waiting_seats, "opening barbershop");

        let shop = self.shop.clone();
        let cut = self.config.cut_delay;
        self.actors.spawn("barber", move || {
            shop.barber_cycle(cut, &mut fastrand::Rng::new());
        })?;

        let shop = self.shop.clone();
        let gap = self.config.arrival_delay;
        self.actors.spawn("arrivals", move || {
            shop.arrival_cycle(gap, &mut fastrand::Rng::new());
        })
    }

    /// # Errors
    ///
    /// Reports an actor that panicked.
    pub fn shutdown(mut self) -> SimulationResult<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> SimulationResult<()> {
        self.shop.shutdown();
        let joined = self.actors.join_all();
        self.shop.events.close();
        joined
    }
}

impl Drop for BarbershopSimulation {
    fn drop(&mut self) {
        if let Err(err) = self.stop_and_join() {
            tracing::warn!(error = %err, "barbershop shutdown on drop failed");
        }
    }
}
