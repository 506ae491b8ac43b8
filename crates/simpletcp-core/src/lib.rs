//! Shared types: disconnect reasons, event hub, keepalive, shutdown, tracing

pub mod events;
pub mod keepalive;
pub mod shutdown;
pub mod tracing;

pub use events::{DisconnectReason, EventHub};
pub use keepalive::{DEFAULT_PING_INTERVAL, DEFAULT_REPLY_TIMEOUT, KeepaliveConfig};
pub use shutdown::{ShutdownHandle, ShutdownSignal};
pub use crate::tracing::{LogFormat, TracingConfig, TracingError, init_tracing};
