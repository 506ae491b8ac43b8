//! The connecting side of a simpletcp transport.
//!
//! A [`Client`] holds at most one session at a time. Each successful
//! [`Client::connect`] starts a new session with its own receive and keepalive
//! tasks; whichever path ends the session first takes it out of the client, so
//! a session is torn down and reported exactly once, and tasks left over from
//! an old session can never touch a newer one.

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use simpletcp_core::{DisconnectReason, EventHub, KeepaliveConfig, ShutdownHandle};
use simpletcp_protocol::{ControlMessage, FrameReader, FrameWriter, Inbound};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Lifecycle state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No session.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected and exchanging messages.
    Connected,
    /// A close was requested and is waiting for the server.
    Closing,
}

/// Something the host should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The connection was established.
    Connected,
    /// A connection attempt failed.
    ConnectionFailed,
    /// The session ended.
    Disconnected(DisconnectReason),
    /// An application message arrived.
    Message(String),
}

/// One connection's worth of state.
struct Session {
    id: u64,
    peer: SocketAddr,
    writer: FrameWriter<OwnedWriteHalf>,
    /// Traffic seen since the last ping.
    alive: AtomicBool,
    close_requested: AtomicBool,
    shutdown: ShutdownHandle,
}

struct ClientInner {
    config: ClientConfig,
    state: watch::Sender<ClientState>,
    events: EventHub<ClientEvent>,
    session: Mutex<Option<Arc<Session>>>,
    next_session: AtomicU64,
}

impl ClientInner {
    fn slot(&self) -> MutexGuard<'_, Option<Arc<Session>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        self.slot().clone()
    }

    fn is_current(slot: &Option<Arc<Session>>, session: &Session) -> bool {
        slot.as_ref().is_some_and(|current| current.id == session.id)
    }

    /// Delivers an application message if the session is still current.
    fn deliver(&self, session: &Session, payload: String) -> bool {
        let slot = self.slot();
        if !Self::is_current(&slot, session) {
            return false;
        }
        self.events.emit(ClientEvent::Message(payload));
        true
    }

    /// Takes the session out of the client if it is still current.
    ///
    /// Only the caller that gets `true` back may release the connection.
    fn end_session(&self, session: &Session, reason: DisconnectReason) -> bool {
        let mut slot = self.slot();
        if !Self::is_current(&slot, session) {
            return false;
        }
        slot.take();
        session.shutdown.trigger();
        self.state.send_replace(ClientState::Disconnected);
        self.events.emit(ClientEvent::Disconnected(reason));
        true
    }

    /// Marks the session as closing and sends the close request.
    async fn begin_close(&self, session: &Session) -> bool {
        {
            let slot = self.slot();
            if !Self::is_current(&slot, session) {
                return false;
            }
            session.close_requested.store(true, Ordering::SeqCst);
            self.state.send_replace(ClientState::Closing);
        }
        debug!(session = session.id, "requesting close");
        session.writer.send_control(ControlMessage::CloseRequest).await
    }
}

/// Ends a session and shuts its connection down. No-op for a stale session.
async fn teardown(inner: &ClientInner, session: &Session, reason: DisconnectReason) {
    if !inner.end_session(session, reason) {
        return;
    }
    info!(peer = %session.peer, reason = %reason, "disconnected");

    let release = async {
        if let Err(e) = session.writer.shutdown().await {
            debug!(error = %e, "failed to shut down write side");
        }
    };
    if tokio::time::timeout(inner.config.keepalive.timeout, release)
        .await
        .is_err()
    {
        debug!("teardown timed out");
    }
}

/// A TCP client speaking the simpletcp framing and keepalive protocol.
///
/// Cloning is cheap; clones share the same session.
///
/// # Example
///
/// ```rust,no_run
/// use simpletcp_client::{Client, ClientConfig, ClientEvent};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(ClientConfig::new(9000));
/// let mut events = client.subscribe();
/// client.connect("127.0.0.1").await?;
/// client.send("hello").await;
///
/// if let Some(ClientEvent::Message(reply)) = events.recv().await {
///     println!("{reply}");
/// }
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a disconnected client.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                state: watch::Sender::new(ClientState::Disconnected),
                events: EventHub::new(),
                session: Mutex::new(None),
                next_session: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> ClientState {
        *self.inner.state.borrow()
    }

    /// Subscribes to client events.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the server address of the current session.
    pub fn peer_addr(&self) -> ClientResult<SocketAddr> {
        self.inner
            .current_session()
            .map(|session| session.peer)
            .ok_or(ClientError::NotConnected)
    }

    /// Connects to `host` on the configured port.
    ///
    /// On failure the client emits [`ClientEvent::ConnectionFailed`] and stays
    /// disconnected; there is no retry.
    pub async fn connect(&self, host: &str) -> ClientResult<()> {
        let claimed = self.inner.state.send_if_modified(|state| {
            if *state == ClientState::Disconnected {
                *state = ClientState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(ClientError::AlreadyConnected);
        }

        let port = self.inner.config.port;
        let connect_timeout = self.inner.config.connect_timeout;
        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.connect_failed(ClientError::connection(host, port, e))),
            Err(_) => {
                return Err(self.connect_failed(ClientError::Timeout(format!(
                    "connecting to {host}:{port} took longer than {connect_timeout:?}"
                ))));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }
        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(e) => return Err(self.connect_failed(ClientError::connection(host, port, e))),
        };

        let codec = self.inner.config.codec;
        let (read_half, write_half) = stream.into_split();
        let session = Arc::new(Session {
            id: self.inner.next_session.fetch_add(1, Ordering::Relaxed) + 1,
            peer,
            writer: FrameWriter::new(write_half, codec),
            alive: AtomicBool::new(true),
            close_requested: AtomicBool::new(false),
            shutdown: ShutdownHandle::new(),
        });

        {
            let mut slot = self.inner.slot();
            *slot = Some(session.clone());
            self.inner.state.send_replace(ClientState::Connected);
            self.inner.events.emit(ClientEvent::Connected);
        }
        info!(peer = %peer, codec = %codec, "connected");

        let reader = FrameReader::new(read_half, codec, self.inner.config.buffer_size);
        tokio::spawn(receive_loop(self.inner.clone(), session.clone(), reader));
        tokio::spawn(keepalive_loop(self.inner.clone(), session));
        Ok(())
    }

    fn connect_failed(&self, error: ClientError) -> ClientError {
        warn!(error = %error, "connection failed");
        self.inner.state.send_replace(ClientState::Disconnected);
        self.inner.events.emit(ClientEvent::ConnectionFailed);
        error
    }

    /// Sends a message. Returns false unless connected and the write succeeded.
    pub async fn send(&self, message: &str) -> bool {
        if self.state() != ClientState::Connected {
            return false;
        }
        match self.inner.current_session() {
            Some(session) => session.writer.send(message).await,
            None => false,
        }
    }

    /// Asks the server to close the connection.
    ///
    /// Completion is reported as [`DisconnectReason::Graceful`] once the server
    /// acknowledges. Returns whether the request was sent.
    pub async fn request_close(&self) -> bool {
        match self.inner.current_session() {
            Some(session) => self.inner.begin_close(&session).await,
            None => false,
        }
    }

    /// Closes the connection, waiting up to the reply timeout for the server
    /// to acknowledge before dropping it with [`DisconnectReason::Forced`].
    pub async fn close(&self) {
        let Some(session) = self.inner.current_session() else {
            return;
        };

        self.inner.begin_close(&session).await;
        let acknowledged = tokio::time::timeout(
            self.inner.config.keepalive.timeout,
            session.shutdown.wait().wait(),
        )
        .await
        .is_ok();

        if !acknowledged {
            warn!(peer = %session.peer, "close was not acknowledged, dropping connection");
            teardown(&self.inner, &session, DisconnectReason::Forced).await;
        }
    }
}

async fn receive_loop(
    inner: Arc<ClientInner>,
    session: Arc<Session>,
    mut reader: FrameReader<OwnedReadHalf>,
) {
    loop {
        let read = tokio::select! {
            _ = session.shutdown.wait().wait() => return,
            read = reader.read_messages() => read,
        };

        match read {
            Ok(Some(messages)) => {
                session.alive.store(true, Ordering::SeqCst);
                for message in messages {
                    if dispatch(&inner, &session, Inbound::from(message)).await.is_break() {
                        return;
                    }
                }
            }
            Ok(None) => {
                debug!(peer = %session.peer, "server closed the stream");
                break;
            }
            Err(e) => {
                debug!(peer = %session.peer, error = %e, "receive failed");
                break;
            }
        }
    }

    teardown(&inner, &session, DisconnectReason::Forced).await;
}

async fn dispatch(inner: &ClientInner, session: &Session, inbound: Inbound) -> ControlFlow<()> {
    match inbound {
        Inbound::Control(ControlMessage::PingRequest) => {
            session.writer.send_control(ControlMessage::PingReply).await;
        }
        Inbound::Control(ControlMessage::PingReply) => {}
        Inbound::Control(ControlMessage::CloseAcknowledged) => {
            debug!("close acknowledged");
            teardown(inner, session, DisconnectReason::Graceful).await;
            return ControlFlow::Break(());
        }
        Inbound::Control(ControlMessage::ServerClosing) => {
            info!("server is shutting down");
            inner.begin_close(session).await;
        }
        Inbound::Control(control) => {
            debug!(control = %control, "ignoring server-bound control message");
        }
        Inbound::Message(payload) => {
            if !inner.deliver(session, payload) {
                return ControlFlow::Break(());
            }
        }
    }
    ControlFlow::Continue(())
}

async fn keepalive_loop(inner: Arc<ClientInner>, session: Arc<Session>) {
    let KeepaliveConfig { interval, timeout } = inner.config.keepalive;

    loop {
        if !session.shutdown.sleep(interval).await {
            return;
        }

        if session.close_requested.load(Ordering::SeqCst) {
            // Still no acknowledgement: give it one more window.
            if session.shutdown.sleep(timeout).await {
                warn!(peer = %session.peer, "close was never acknowledged");
                teardown(&inner, &session, DisconnectReason::Timeout).await;
            }
            return;
        }

        session.alive.store(false, Ordering::SeqCst);
        debug!("sending ping");
        session.writer.send_control(ControlMessage::PingRequest).await;

        if !session.shutdown.sleep(timeout).await {
            return;
        }
        if !session.alive.load(Ordering::SeqCst) && !session.close_requested.load(Ordering::SeqCst)
        {
            warn!(peer = %session.peer, "no reply to ping");
            teardown(&inner, &session, DisconnectReason::Timeout).await;
            return;
        }
    }
}
