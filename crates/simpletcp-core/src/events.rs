//! Host-facing event delivery.
//!
//! Both roles report lifecycle changes and application messages to the host
//! through an [`EventHub`]. Every subscriber gets its own unbounded channel so a
//! slow consumer never stalls a connection's receive loop. Emitting with no
//! subscribers is a no-op.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The peer did not answer a keepalive probe in time.
    Timeout,
    /// The transport failed, or a drain deadline expired.
    Forced,
    /// The close-request / acknowledge exchange completed.
    Graceful,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Forced => write!(f, "forced"),
            Self::Graceful => write!(f, "graceful"),
        }
    }
}

/// Fan-out list of event subscribers.
#[derive(Debug)]
pub struct EventHub<E> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<E>>>,
}

impl<E> Default for EventHub<E> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Clone> EventHub<E> {
    /// Creates a hub with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    ///
    /// Dropping the returned receiver unsubscribes it on the next emit.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Delivers an event to every live subscriber.
    pub fn emit(&self, event: E) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<E>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
