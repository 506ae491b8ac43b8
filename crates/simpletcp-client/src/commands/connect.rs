//! Connect command: an interactive line client.
//!
//! Every stdin line is sent as one message and every received message is
//! printed on its own line. The session is closed gracefully at end of input
//! or on SIGINT/SIGTERM.

use std::io::BufRead;

use simpletcp_core::DisconnectReason;
use simpletcp_server::SignalHandler;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client::{Client, ClientEvent};
use crate::config::Settings;
use crate::error::{ClientError, ClientResult};

/// Connects to `host` and relays stdin and stdout until either side stops.
pub async fn run(settings: &Settings, host: &str, port: Option<u16>) -> ClientResult<()> {
    let mut config = settings.client_config();
    if let Some(port) = port {
        config.port = port;
    }

    let client = Client::new(config);
    let mut events = client.subscribe();
    client.connect(host).await?;

    let signal_handler = SignalHandler::new();
    signal_handler.spawn_listener();
    let shutdown = signal_handler.shutdown().wait();
    tokio::pin!(shutdown);

    let mut lines = spawn_stdin_reader();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.recv() => match line {
                Some(Ok(line)) => {
                    if !client.send(&line).await {
                        warn!("message not sent");
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "failed to read stdin");
                    break;
                }
                None => break,
            },
            event = events.recv() => match event {
                Some(ClientEvent::Message(payload)) => println!("{payload}"),
                Some(ClientEvent::Disconnected(reason)) => return disconnected(reason),
                Some(_) => {}
                None => break,
            },
        }
    }

    info!("closing connection");
    client.close().await;
    Ok(())
}

fn disconnected(reason: DisconnectReason) -> ClientResult<()> {
    match reason {
        DisconnectReason::Graceful => {
            info!("server closed the connection");
            Ok(())
        }
        DisconnectReason::Timeout => Err(ClientError::Timeout("server stopped responding".into())),
        DisconnectReason::Forced => Err(ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionAborted,
            "connection lost",
        ))),
    }
}

/// Reads stdin on a plain thread so a pending read never holds up exit.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
