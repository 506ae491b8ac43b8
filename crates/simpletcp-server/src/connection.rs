//! Per-connection tasks.
//!
//! Every accepted stream gets a receive task and a keepalive task. Both stop
//! when the connection's shutdown handle fires, which happens exactly once,
//! when the connection is removed from the registry. Whoever removes the entry
//! owns the teardown, so each connection reports at most one disconnect.

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;

use simpletcp_core::{DisconnectReason, KeepaliveConfig, ShutdownHandle};
use simpletcp_protocol::{ControlMessage, FrameReader, FrameWriter, Inbound};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tracing::{debug, info, warn};

use crate::registry::{ConnectionId, Entry};
use crate::server::{ServerEvent, ServerInner, Writer};

/// Registers an accepted stream and starts its tasks.
pub(crate) async fn register(inner: Arc<ServerInner>, stream: TcpStream, peer: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
    }

    let (read_half, write_half) = stream.into_split();
    let writer = Arc::new(FrameWriter::new(write_half, inner.config.codec));
    let shutdown = ShutdownHandle::new();
    let id = inner.next_connection_id();

    {
        let mut registry = inner.registry.write().await;
        if !inner.is_open() {
            debug!(peer = %peer, "server is not open, dropping connection");
            return;
        }
        registry.insert(id, Entry::new(peer, writer, shutdown.clone()));
        // Emitted under the lock so it precedes anything else about this id.
        inner.events.emit(ServerEvent::Connected { id, peer });
    }
    info!(conn = %id, peer = %peer, "client connected");

    let reader = FrameReader::new(read_half, inner.config.codec, inner.config.buffer_size);
    tokio::spawn(receive_loop(inner.clone(), id, reader, shutdown.clone()));
    tokio::spawn(keepalive_loop(inner, id, shutdown));
}

async fn receive_loop(
    inner: Arc<ServerInner>,
    id: ConnectionId,
    mut reader: FrameReader<OwnedReadHalf>,
    shutdown: ShutdownHandle,
) {
    loop {
        let read = tokio::select! {
            _ = shutdown.wait().wait() => return,
            read = reader.read_messages() => read,
        };

        match read {
            Ok(Some(messages)) => {
                if !inner.registry.write().await.mark_alive(id) {
                    return;
                }
                for message in messages {
                    if dispatch(&inner, id, Inbound::from(message)).await.is_break() {
                        return;
                    }
                }
            }
            Ok(None) => {
                debug!(conn = %id, "peer closed the stream");
                break;
            }
            Err(e) => {
                debug!(conn = %id, error = %e, "receive failed");
                break;
            }
        }
    }

    drop_connection(&inner, id, DisconnectReason::Forced).await;
}

/// Handles one received message. Breaks when the connection is gone.
async fn dispatch(inner: &ServerInner, id: ConnectionId, inbound: Inbound) -> ControlFlow<()> {
    match inbound {
        Inbound::Control(ControlMessage::PingRequest) => {
            let writer = inner.registry.read().await.writer(id);
            if let Some(writer) = writer {
                writer.send_control(ControlMessage::PingReply).await;
            }
        }
        Inbound::Control(ControlMessage::PingReply) => {}
        Inbound::Control(ControlMessage::CloseRequest) => {
            debug!(conn = %id, "close requested");
            drop_connection(inner, id, DisconnectReason::Graceful).await;
            return ControlFlow::Break(());
        }
        Inbound::Control(control) => {
            debug!(conn = %id, control = %control, "ignoring client-bound control message");
        }
        Inbound::Message(payload) => {
            let registry = inner.registry.read().await;
            if !registry.contains(id) {
                return ControlFlow::Break(());
            }
            inner.events.emit(ServerEvent::Message { id, payload });
        }
    }
    ControlFlow::Continue(())
}

async fn keepalive_loop(inner: Arc<ServerInner>, id: ConnectionId, shutdown: ShutdownHandle) {
    let KeepaliveConfig { interval, timeout } = inner.config.keepalive;

    loop {
        if !shutdown.sleep(interval).await || !inner.is_open() {
            return;
        }

        let Some(writer) = inner.registry.write().await.begin_probe(id) else {
            return;
        };
        debug!(conn = %id, "sending ping");
        writer.send_control(ControlMessage::PingRequest).await;
        drop(writer);

        if !shutdown.sleep(timeout).await || !inner.is_open() {
            return;
        }

        let alive = inner.registry.read().await.is_alive(id);
        match alive {
            Some(true) => {}
            Some(false) => {
                warn!(conn = %id, "no reply to ping");
                drop_connection(&inner, id, DisconnectReason::Timeout).await;
                return;
            }
            None => return,
        }
    }
}

/// Removes a connection and stops its tasks.
///
/// Returns `None` if another path already removed it.
pub(crate) async fn detach(inner: &ServerInner, id: ConnectionId) -> Option<Entry<Writer>> {
    let entry = inner.registry.write().await.remove(id)?;
    entry.shutdown.trigger();
    Some(entry)
}

/// Acknowledges the close and shuts the write side. Best effort.
pub(crate) async fn release(inner: &ServerInner, id: ConnectionId, writer: &Writer) {
    let teardown = async {
        writer.send_control(ControlMessage::CloseAcknowledged).await;
        if let Err(e) = writer.shutdown().await {
            debug!(conn = %id, error = %e, "failed to shut down write side");
        }
    };
    if tokio::time::timeout(inner.config.keepalive.timeout, teardown)
        .await
        .is_err()
    {
        debug!(conn = %id, "teardown timed out");
    }
}

/// Removes a connection, reports why, and releases it.
///
/// Returns false if the connection was already gone.
pub(crate) async fn drop_connection(
    inner: &ServerInner,
    id: ConnectionId,
    reason: DisconnectReason,
) -> bool {
    let Some(entry) = detach(inner, id).await else {
        return false;
    };
    info!(conn = %id, peer = %entry.peer, reason = %reason, "client disconnected");
    inner.events.emit(ServerEvent::Disconnected { id, reason });
    release(inner, id, &entry.writer).await;
    true
}
