//! The listening side of a simpletcp transport.
//!
//! A [`Server`] moves through `Closed → Open → Closing → Closed`. While open it
//! accepts TCP connections, registers each one, and runs a receive task and a
//! keepalive task per connection. Closing asks every client to leave, waits for
//! the registry to drain, and forces out whoever is left.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use futures_util::future::join_all;
use simpletcp_core::{DisconnectReason, EventHub, ShutdownHandle};
use simpletcp_protocol::{ControlMessage, FrameWriter};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection;
use crate::error::{ServerError, ServerResult};
use crate::registry::{ConnectionId, Registry, SharedRegistry};

/// Send half of an accepted connection.
pub(crate) type Writer = FrameWriter<OwnedWriteHalf>;

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Not listening.
    Closed,
    /// Accepting and serving connections.
    Open,
    /// Draining connections before returning to `Closed`.
    Closing,
}

/// Something the host should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client connected and was registered.
    Connected { id: ConnectionId, peer: SocketAddr },
    /// A registered client is gone.
    Disconnected {
        id: ConnectionId,
        reason: DisconnectReason,
    },
    /// An application message arrived.
    Message { id: ConnectionId, payload: String },
}

/// The running accept loop.
struct ListenerTask {
    shutdown: ShutdownHandle,
    task: JoinHandle<()>,
}

/// State shared by the server handle and every task it spawns.
pub(crate) struct ServerInner {
    pub(crate) config: ServerConfig,
    pub(crate) state: watch::Sender<ServerState>,
    pub(crate) registry: SharedRegistry<Writer>,
    pub(crate) events: EventHub<ServerEvent>,
    next_id: AtomicU64,
    local_addr: std::sync::Mutex<Option<SocketAddr>>,
    /// Serialises `open` and `close`.
    listener: Mutex<Option<ListenerTask>>,
}

impl ServerInner {
    pub(crate) fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state() == ServerState::Open
    }

    pub(crate) fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn set_local_addr(&self, addr: Option<SocketAddr>) {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = addr;
    }
}

/// A TCP server speaking the simpletcp framing and keepalive protocol.
///
/// Cloning is cheap; clones share the same listener and connections.
///
/// # Example
///
/// ```rust,no_run
/// use simpletcp_server::{Server, ServerConfig, ServerEvent};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Server::new(ServerConfig::new(9000));
/// let mut events = server.subscribe();
/// server.open().await?;
///
/// while let Some(event) = events.recv().await {
///     if let ServerEvent::Message { id, payload } = event {
///         server.send(id, &payload).await;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a closed server.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                config,
                state: watch::Sender::new(ServerState::Closed),
                registry: Registry::new_shared(),
                events: EventHub::new(),
                next_id: AtomicU64::new(0),
                local_addr: std::sync::Mutex::new(None),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> ServerState {
        self.inner.state()
    }

    /// Subscribes to server events.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ServerEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the bound address while the server is listening.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        self.inner
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ok_or(ServerError::NotOpen)
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.registry.read().await.len()
    }

    /// Ids of every registered connection, oldest first.
    pub async fn connections(&self) -> Vec<ConnectionId> {
        self.inner.registry.read().await.ids()
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    pub async fn open(&self) -> ServerResult<SocketAddr> {
        let mut listener = self.inner.listener.lock().await;
        if self.state() != ServerState::Closed {
            return Err(ServerError::AlreadyOpen);
        }

        let addr = self.inner.config.socket_addr();
        let tcp = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))?;
        let local_addr = tcp.local_addr()?;

        self.inner.state.send_replace(ServerState::Open);
        self.inner.set_local_addr(Some(local_addr));

        let shutdown = ShutdownHandle::new();
        let task = tokio::spawn(accept_loop(self.inner.clone(), tcp, shutdown.clone()));
        *listener = Some(ListenerTask { shutdown, task });

        info!(addr = %local_addr, codec = %self.inner.config.codec, "server listening");
        Ok(local_addr)
    }

    /// Shuts the server down.
    ///
    /// Every client is sent the closing notice and given `shutdown_timeout` to
    /// complete the close handshake; stragglers are then disconnected with
    /// [`DisconnectReason::Forced`]. Does nothing unless the server is open.
    pub async fn close(&self) {
        let mut listener = self.inner.listener.lock().await;
        if self.state() != ServerState::Open {
            return;
        }

        {
            let _registry = self.inner.registry.write().await;
            self.inner.state.send_replace(ServerState::Closing);
        }
        info!("server closing");

        let writers = self.inner.registry.read().await.writers();
        let notice_timeout = self.inner.config.keepalive.timeout;
        join_all(writers.iter().map(|(id, writer)| async move {
            let notice = writer.send_control(ControlMessage::ServerClosing);
            if !matches!(tokio::time::timeout(notice_timeout, notice).await, Ok(true)) {
                debug!(conn = %id, "closing notice not delivered");
            }
        }))
        .await;

        let mut size = self.inner.registry.read().await.watch_size();
        let drained = matches!(
            tokio::time::timeout(
                self.inner.config.shutdown_timeout,
                size.wait_for(|remaining| *remaining == 0),
            )
            .await,
            Ok(Ok(_))
        );

        if !drained {
            let remaining = self.inner.registry.read().await.ids();
            warn!(
                count = remaining.len(),
                "shutdown timeout elapsed, forcing remaining connections"
            );
            join_all(remaining.into_iter().map(|id| {
                connection::drop_connection(&self.inner, id, DisconnectReason::Forced)
            }))
            .await;
        }

        if let Some(ListenerTask { shutdown, task }) = listener.take() {
            shutdown.trigger();
            if let Err(e) = task.await {
                warn!(error = %e, "accept loop did not stop cleanly");
            }
        }

        self.inner.set_local_addr(None);
        self.inner.state.send_replace(ServerState::Closed);
        info!("server closed");
    }

    /// Sends a message to one connection.
    ///
    /// Returns false if the server is not open, the connection is not
    /// registered, or the write failed.
    pub async fn send(&self, id: ConnectionId, message: &str) -> bool {
        if !self.inner.is_open() {
            return false;
        }
        let writer = self.inner.registry.read().await.writer(id);
        match writer {
            Some(writer) => writer.send(message).await,
            None => false,
        }
    }

    /// Closes one connection at the host's request.
    ///
    /// The peer gets a close acknowledgement before the write side is shut.
    /// No event is emitted. Returns false if the connection is not registered.
    pub async fn close_connection(&self, id: ConnectionId) -> bool {
        let Some(entry) = connection::detach(&self.inner, id).await else {
            return false;
        };
        info!(conn = %id, peer = %entry.peer, "closing connection");
        connection::release(&self.inner, id, &entry.writer).await;
        true
    }
}

/// Accepts connections until `shutdown` fires.
async fn accept_loop(inner: Arc<ServerInner>, listener: TcpListener, shutdown: ShutdownHandle) {
    loop {
        tokio::select! {
            _ = shutdown.wait().wait() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "accepted connection");
                    tokio::spawn(connection::register(inner.clone(), stream, peer));
                }
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    if !inner.is_open() {
                        break;
                    }
                }
            },
        }
    }
    debug!("accept loop stopped");
}
