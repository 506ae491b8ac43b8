//! Client configuration.
//!
//! [`ClientConfig`] is what a [`Client`](crate::Client) is built from. The
//! `simpletcp` binary reads [`Settings`] from a single `config.toml`, at
//! `~/.config/simpletcp/config.toml` by default, and derives both the client
//! and the server configuration from it.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use simpletcp_core::{DEFAULT_PING_INTERVAL, DEFAULT_REPLY_TIMEOUT, KeepaliveConfig};
use simpletcp_protocol::{DEFAULT_BUFFER_SIZE, DEFAULT_PORT, TextCodec};
use simpletcp_server::ServerConfig;

use crate::error::{ClientError, ClientResult};

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// ClientConfig (library)
// ---------------------------------------------------------------------------

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server port.
    pub port: u16,

    /// Bytes read from the connection per receive.
    pub buffer_size: usize,

    /// Ping interval and reply timeout.
    pub keepalive: KeepaliveConfig,

    /// Text codec; must match the server's.
    pub codec: TextCodec,

    /// How long `connect` may take.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            keepalive: KeepaliveConfig::default(),
            codec: TextCodec::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Creates a client configuration for the given server port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
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

    /// Builder: set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// ---------------------------------------------------------------------------
// Settings (config.toml)
// ---------------------------------------------------------------------------

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Settings shared by both roles.
    pub transport: TransportSettings,

    /// Settings for `simpletcp serve`.
    pub server: ServerSettings,

    /// Settings for `simpletcp connect`.
    pub client: ClientSettings,
}

/// Settings both ends must agree on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// TCP port.
    pub port: u16,

    /// Receive buffer size in bytes.
    pub buffer_size: usize,

    /// Seconds between keepalive pings.
    pub ping_interval_secs: u64,

    /// Seconds a ping may go unanswered.
    pub timeout_secs: u64,

    /// Text codec name, e.g. `utf-8` or `utf-16le`.
    pub codec: TextCodec,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            ping_interval_secs: DEFAULT_PING_INTERVAL.as_secs(),
            timeout_secs: DEFAULT_REPLY_TIMEOUT.as_secs(),
            codec: TextCodec::default(),
        }
    }
}

/// Server-only settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to listen on.
    pub bind_address: IpAddr,

    /// Seconds to wait for clients to leave on shutdown.
    ///
    /// Defaults to the transport timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout_secs: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            shutdown_timeout_secs: None,
        }
    }
}

/// Client-only settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Seconds a connection attempt may take.
    pub connect_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

impl Settings {
    /// Loads settings from the default path, or defaults if there is no file.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads settings from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("simpletcp")
    }

    /// Checks values that would make the transport unusable.
    pub fn validate(&self) -> ClientResult<()> {
        if self.transport.buffer_size == 0 {
            return Err(ClientError::Config(
                "transport.buffer_size must be greater than zero".into(),
            ));
        }
        if self.transport.ping_interval_secs == 0 {
            return Err(ClientError::Config(
                "transport.ping_interval_secs must be greater than zero".into(),
            ));
        }
        if self.transport.timeout_secs == 0 {
            return Err(ClientError::Config(
                "transport.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    fn keepalive(&self) -> KeepaliveConfig {
        KeepaliveConfig::new(
            Duration::from_secs(self.transport.ping_interval_secs),
            Duration::from_secs(self.transport.timeout_secs),
        )
    }

    /// Builds the server configuration.
    pub fn server_config(&self) -> ServerConfig {
        let keepalive = self.keepalive();
        let shutdown_timeout = self
            .server
            .shutdown_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(keepalive.timeout);

        ServerConfig::new(self.transport.port)
            .with_bind_address(self.server.bind_address)
            .with_buffer_size(self.transport.buffer_size)
            .with_keepalive(keepalive.interval, keepalive.timeout)
            .with_codec(self.transport.codec)
            .with_shutdown_timeout(shutdown_timeout)
    }

    /// Builds the client configuration.
    pub fn client_config(&self) -> ClientConfig {
        let keepalive = self.keepalive();
        ClientConfig::new(self.transport.port)
            .with_buffer_size(self.transport.buffer_size)
            .with_keepalive(keepalive.interval, keepalive.timeout)
            .with_codec(self.transport.codec)
            .with_connect_timeout(Duration::from_secs(self.client.connect_timeout_secs))
    }
}
