//! One-shot shutdown signalling.
//!
//! A [`ShutdownHandle`] is a cloneable flag backed by a `watch` channel. The
//! server keeps one for its accept loop and one per connection; every task
//! bound to that lifetime selects on [`ShutdownSignal::wait`] so removal from
//! the registry stops it promptly instead of at the next loop check.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// A handle for triggering or checking shutdown status.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    /// Creates a handle in the running state.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Triggers a shutdown. Triggering twice is harmless.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true if shutdown has been triggered.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Returns a future that completes when shutdown is triggered.
    pub fn wait(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.rx.clone(),
        }
    }

    /// Sleeps for `duration` unless shutdown is triggered first.
    ///
    /// Returns true if the full duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_shutdown(),
            _ = self.wait().wait() => false,
        }
    }
}

/// A signal that completes when shutdown is signaled.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown signal.
    ///
    /// Also returns if every handle was dropped, since nothing can trigger
    /// the shutdown any more.
    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
