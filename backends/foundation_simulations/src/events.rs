// One-directional event delivery from an engine to its observers.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crossbeam::channel;

/// `EventBus` fans every emitted event out to all live subscribers.
///
/// Delivery is eager and unbounded: [`EventBus::emit`] never waits on
/// an observer, and an observer that subscribes late does not see
/// events emitted before it joined. Subscribers whose stream has been
/// dropped are pruned on the next emit.
pub struct EventBus<E> {
    subscribers: Mutex<Vec<channel::Sender<E>>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> core::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<E> EventBus<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> EventStream<E> {
        let (sender, receiver) = channel::unbounded::<E>();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        EventStream { src: receiver }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drops every sender so blocked observers see the end of the stream.
    pub fn close(&self) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<E: Clone> EventBus<E> {
    pub fn emit(&self, event: E) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sub| sub.try_send(event.clone()).is_ok());
    }
}

/// Receiving half handed to an observer by [`EventBus::subscribe`].
#[derive(Debug)]
pub struct EventStream<E> {
    src: channel::Receiver<E>,
}

impl<E> EventStream<E> {
    /// Returns the next queued event without blocking.
    pub fn try_next(&self) -> Option<E> {
        self.src.try_recv().ok()
    }

    /// Blocks until an event arrives or the bus is closed.
    pub fn next_blocking(&self) -> Option<E> {
        self.src.recv().ok()
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<E> {
        self.src.recv_timeout(timeout).ok()
    }

    /// Takes every event queued so far.
    pub fn drain(&self) -> Vec<E> {
        self.src.try_iter().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }
}

impl<E> Iterator for EventStream<E> {
    type Item = E;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_blocking()
    }
}
