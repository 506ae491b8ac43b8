//! Termination signal handling.
//!
//! SIGTERM and SIGINT (Ctrl+C elsewhere) trigger a [`ShutdownHandle`] so the
//! host can close its server or client gracefully instead of dying mid-frame.

use simpletcp_core::{ShutdownHandle, ShutdownSignal};
use tracing::{debug, info, warn};

/// Turns termination signals into a shutdown trigger.
#[derive(Debug, Clone, Default)]
pub struct SignalHandler {
    shutdown: ShutdownHandle,
}

impl SignalHandler {
    /// Creates a new signal handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the signal listener task.
    ///
    /// Call once at startup. If a handler cannot be installed the failure is
    /// logged and that signal keeps its default behaviour.
    #[cfg(unix)]
    pub fn spawn_listener(&self) {
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!(error = %e, "failed to install signal handlers");
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
                _ = shutdown.wait().wait() => {
                    debug!("signal listener stopped");
                    return;
                }
            }
            shutdown.trigger();
        });
    }

    /// Spawns the signal listener task.
    #[cfg(not(unix))]
    pub fn spawn_listener(&self) {
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("received Ctrl+C, shutting down");
                        shutdown.trigger();
                    }
                    Err(e) => warn!(error = %e, "failed to listen for Ctrl+C"),
                },
                _ = shutdown.wait().wait() => debug!("signal listener stopped"),
            }
        });
    }

    /// Returns a future that completes when shutdown is signaled.
    pub fn shutdown(&self) -> ShutdownSignal {
        self.shutdown.wait()
    }

    /// Returns true if shutdown has been signaled.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_shutdown()
    }

    /// Programmatically triggers a shutdown.
    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_shutdown() {
        let handler = SignalHandler::new();
        assert!(!handler.is_shutdown());

        handler.trigger_shutdown();
        assert!(handler.is_shutdown());
    }

    #[tokio::test]
    async fn shutdown_signal_wait() {
        let handler = SignalHandler::new();
        let shutdown = handler.shutdown();

        let trigger = handler.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger_shutdown();
        });

        let result = tokio::time::timeout(Duration::from_millis(500), shutdown.wait()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn listener_exits_on_programmatic_shutdown() {
        let handler = SignalHandler::new();
        handler.spawn_listener();
        handler.trigger_shutdown();

        let stopped = handler.shutdown().wait();
        let result = tokio::time::timeout(Duration::from_millis(500), stopped).await;
        assert!(result.is_ok());
    }
}
