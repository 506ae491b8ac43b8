//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use simpletcp_core::KeepaliveConfig;
use simpletcp_protocol::{DEFAULT_BUFFER_SIZE, DEFAULT_PORT, TextCodec};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_address: IpAddr,

    /// Port to listen on; 0 picks a free port.
    pub port: u16,

    /// Bytes read from a connection per receive.
    pub buffer_size: usize,

    /// Ping interval and reply timeout, applied per connection.
    pub keepalive: KeepaliveConfig,

    /// Text codec shared with every client.
    pub codec: TextCodec,

    /// How long `close` waits for clients to leave before forcing them out.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let keepalive = KeepaliveConfig::default();
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            shutdown_timeout: keepalive.timeout,
            keepalive,
            codec: TextCodec::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration listening on the given port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Builder: set the bind address.
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Builder: set the receive buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Builder: set ping interval and reply timeout.
    pub fn with_keepalive(mut self, interval: Duration, timeout: Duration) -> Self {
        self.keepalive = KeepaliveConfig::new(interval, timeout);
        self
    }

    /// Builder: set the text codec.
    pub fn with_codec(mut self, codec: TextCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Builder: set the drain timeout used by `close`.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Returns the socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
