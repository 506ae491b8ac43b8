//! Server role: accept loop, connection registry, keepalive, coordinated shutdown.
//!
//! This crate provides the listening side of a simpletcp transport:
//! - A TCP accept loop that registers every client under a [`ConnectionId`]
//! - Per-connection receive and keepalive tasks
//! - Graceful shutdown that drains clients before forcing them out
//! - Termination signal handling for hosts
//!
//! # Example
//!
//! ```rust,no_run
//! use simpletcp_server::{Server, ServerConfig, SignalHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::new(9000));
//!     server.open().await?;
//!
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!     signals.shutdown().wait().await;
//!
//!     server.close().await;
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod error;
mod registry;
mod server;
mod signals;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use registry::ConnectionId;
pub use server::{Server, ServerEvent, ServerState};
pub use signals::SignalHandler;
