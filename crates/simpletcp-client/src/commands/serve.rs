//! Serve command: runs a server in the foreground.
//!
//! Received messages are printed as `<connection> <payload>`. The server is
//! closed gracefully on SIGINT/SIGTERM.

use std::net::IpAddr;

use simpletcp_server::{Server, ServerEvent, SignalHandler};
use tracing::info;

use crate::config::Settings;
use crate::error::ClientResult;

/// Starts a server and runs it until a termination signal arrives.
pub async fn run(
    settings: &Settings,
    port: Option<u16>,
    bind: Option<IpAddr>,
    echo: bool,
) -> ClientResult<()> {
    let mut config = settings.server_config();
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(bind) = bind {
        config.bind_address = bind;
    }

    let server = Server::new(config);
    let mut events = server.subscribe();
    server.open().await?;

    let signal_handler = SignalHandler::new();
    signal_handler.spawn_listener();
    let shutdown = signal_handler.shutdown().wait();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => handle_event(&server, event, echo).await,
                None => break,
            },
        }
    }

    info!("shutting down");
    server.close().await;
    Ok(())
}

async fn handle_event(server: &Server, event: ServerEvent, echo: bool) {
    match event {
        ServerEvent::Connected { id, peer } => println!("{id} connected from {peer}"),
        ServerEvent::Disconnected { id, reason } => println!("{id} disconnected ({reason})"),
        ServerEvent::Message { id, payload } => {
            println!("{id} {payload}");
            if echo && !server.send(id, &payload).await {
                info!(conn = %id, "echo not delivered");
            }
        }
    }
}
