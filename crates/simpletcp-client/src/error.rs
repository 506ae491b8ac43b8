//! Client error types.

use std::io;

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client and the `simpletcp` binary.
#[derive(Debug, Error)]
pub enum ClientError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (unknown codec, etc.).
    #[error("protocol error: {0}")]
    Protocol(#[from] simpletcp_protocol::ProtocolError),

    /// Server error, from the `serve` command.
    #[error("server error: {0}")]
    Server(#[from] simpletcp_server::ServerError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection to the server failed.
    #[error("failed to connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: io::Error,
    },

    /// An operation took too long.
    #[error("timeout: {0}")]
    Timeout(String),

    /// `connect` was called while a session exists or is being set up.
    #[error("client is already connected")]
    AlreadyConnected,

    /// The operation needs a connected client.
    #[error("client is not connected")]
    NotConnected,

    /// Logging could not be set up.
    #[error(transparent)]
    Tracing(#[from] simpletcp_core::TracingError),
}

impl ClientError {
    /// Creates a connection error for `host:port`.
    pub fn connection(host: &str, port: u16, source: io::Error) -> Self {
        Self::Connection {
            target: format!("{host}:{port}"),
            source,
        }
    }
}
