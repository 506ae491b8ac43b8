//! Registry of live connections.
//!
//! One map, shared behind an `RwLock`, holds every registered connection's
//! liveness flag, its send half and its shutdown handle. Entries are added on
//! accept and removed exactly once; every later lookup or removal of the same
//! id is a no-op. The current size is published on a `watch` channel so
//! shutdown can wait for the registry to drain.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use simpletcp_core::ShutdownHandle;
use tokio::sync::{RwLock, watch};

/// Identity of one accepted connection, unique for the server's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    /// Wraps a numeric id, e.g. one parsed from host input.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-connection state owned by the registry.
#[derive(Debug)]
pub(crate) struct Entry<W> {
    /// Peer address, for diagnostics.
    pub(crate) peer: SocketAddr,
    /// Traffic seen since the last probe.
    pub(crate) alive: bool,
    /// Send half.
    pub(crate) writer: Arc<W>,
    /// Stops the connection's receive and keepalive tasks.
    pub(crate) shutdown: ShutdownHandle,
}

impl<W> Entry<W> {
    pub(crate) fn new(peer: SocketAddr, writer: Arc<W>, shutdown: ShutdownHandle) -> Self {
        Self {
            peer,
            alive: true,
            writer,
            shutdown,
        }
    }
}

/// Registry shared between the accept loop, connection tasks and `close`.
pub(crate) type SharedRegistry<W> = Arc<RwLock<Registry<W>>>;

/// Live connections keyed by id.
#[derive(Debug)]
pub(crate) struct Registry<W> {
    entries: HashMap<ConnectionId, Entry<W>>,
    size: watch::Sender<usize>,
}

impl<W> Default for Registry<W> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            size: watch::Sender::new(0),
        }
    }
}

impl<W> Registry<W> {
    pub(crate) fn new_shared() -> SharedRegistry<W> {
        Arc::new(RwLock::new(Self::default()))
    }

    pub(crate) fn insert(&mut self, id: ConnectionId, entry: Entry<W>) {
        self.entries.insert(id, entry);
        self.publish_size();
    }

    /// Removes a connection. Returns `None` if it was not registered.
    pub(crate) fn remove(&mut self, id: ConnectionId) -> Option<Entry<W>> {
        let entry = self.entries.remove(&id)?;
        self.publish_size();
        Some(entry)
    }

    pub(crate) fn contains(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Records inbound traffic. Returns false if the connection is gone.
    pub(crate) fn mark_alive(&mut self, id: ConnectionId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.alive = true;
                true
            }
            None => false,
        }
    }

    /// Clears the liveness flag ahead of a ping and hands out the writer to
    /// send it with.
    pub(crate) fn begin_probe(&mut self, id: ConnectionId) -> Option<Arc<W>> {
        let entry = self.entries.get_mut(&id)?;
        entry.alive = false;
        Some(entry.writer.clone())
    }

    pub(crate) fn is_alive(&self, id: ConnectionId) -> Option<bool> {
        self.entries.get(&id).map(|entry| entry.alive)
    }

    pub(crate) fn writer(&self, id: ConnectionId) -> Option<Arc<W>> {
        self.entries.get(&id).map(|entry| entry.writer.clone())
    }

    /// Writers of every registered connection, for broadcasts.
    pub(crate) fn writers(&self) -> Vec<(ConnectionId, Arc<W>)> {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, entry.writer.clone()))
            .collect()
    }

    /// Registered ids in accept order.
    pub(crate) fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Subscribes to size changes.
    pub(crate) fn watch_size(&self) -> watch::Receiver<usize> {
        self.size.subscribe()
    }

    fn publish_size(&self) {
        self.size.send_replace(self.entries.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:5000".parse().unwrap()
    }

    fn registry_with(ids: &[u64]) -> Registry<()> {
        let mut registry = Registry::default();
        for &id in ids {
            registry.insert(
                ConnectionId(id),
                Entry::new(peer(), Arc::new(()), ShutdownHandle::new()),
            );
        }
        registry
    }

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId(7).to_string(), "conn-7");
        assert_eq!(ConnectionId::from_raw(7).get(), 7);
    }

    #[test]
    fn new_entries_start_alive() {
        let registry = registry_with(&[1]);
        assert_eq!(registry.is_alive(ConnectionId(1)), Some(true));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = registry_with(&[1, 2]);

        assert!(registry.remove(ConnectionId(1)).is_some());
        assert!(registry.remove(ConnectionId(1)).is_none());
        assert!(registry.remove(ConnectionId(99)).is_none());

        assert_eq!(registry.ids(), vec![ConnectionId(2)]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn probe_cycle() {
        let mut registry = registry_with(&[1]);
        let id = ConnectionId(1);

        assert!(registry.begin_probe(id).is_some());
        assert_eq!(registry.is_alive(id), Some(false));

        assert!(registry.mark_alive(id));
        assert_eq!(registry.is_alive(id), Some(true));
    }

    #[test]
    fn absent_connections_report_nothing() {
        let mut registry = registry_with(&[]);
        let id = ConnectionId(3);

        assert!(!registry.mark_alive(id));
        assert!(registry.begin_probe(id).is_none());
        assert!(registry.is_alive(id).is_none());
        assert!(registry.writer(id).is_none());
        assert!(!registry.contains(id));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn size_is_published() {
        let mut registry = registry_with(&[1, 2]);
        let size = registry.watch_size();
        assert_eq!(*size.borrow(), 2);

        registry.remove(ConnectionId(1));
        assert_eq!(*size.borrow(), 1);
        registry.remove(ConnectionId(2));
        assert_eq!(*size.borrow(), 0);
    }

    #[test]
    fn ids_are_sorted() {
        let registry = registry_with(&[5, 1, 3]);
        assert_eq!(
            registry.ids(),
            vec![ConnectionId(1), ConnectionId(3), ConnectionId(5)]
        );
        assert_eq!(registry.writers().len(), 3);
    }
}
