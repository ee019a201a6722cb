//! Classic synchronization problems as runnable, observable engines.
//!
//! This crate provides:
//! - **Bounded buffer**: one producer and one consumer sharing a ring of
//!   slots guarded by two counting semaphores and a mutex
//! - **Sleeping barber**: a barber, a bounded waiting room and a one to
//!   one handshake between the barber and the customer being served
//! - **Dining philosophers**: a ring of forks acquired in a global order
//!   so the table can never deadlock
//!
//! Every engine publishes its state transitions on an event stream and
//! supports a `shutdown` that releases every blocked actor.
//!
//! # Examples
//!
//! ```rust
//! use foundation_simulations::bounded_buffer::{BoundedBuffer, Item};
//!
//! let buffer = BoundedBuffer::<Item>::new(3).expect("valid capacity");
//! let events = buffer.subscribe();
//!
//! buffer.produce(Item(1)).expect("should produce");
//! assert_eq!(buffer.consume().expect("should consume"), Item(1));
//! assert_eq!(events.drain().len(), 2);
//! ```

pub mod actors;
pub mod barbershop;
pub mod bounded_buffer;
pub mod config;
pub mod dining_table;
pub mod errors;
pub mod events;
pub mod synca;

pub use barbershop::{Barbershop, BarbershopEvent, BarbershopSimulation, BarberState, Outcome};
pub use bounded_buffer::{BoundedBuffer, BufferEvent, Item, ProducerConsumerSimulation};
pub use config::{BarbershopConfig, BufferConfig, DelayRange, DiningConfig, SimulationConfig};
pub use dining_table::{
    DiningEvent, DiningSimulation, DiningTable, PhilosopherState, TableSnapshot,
};
pub use errors::{ConfigurationError, SimulationError, SimulationResult};
pub use events::{EventBus, EventStream};
