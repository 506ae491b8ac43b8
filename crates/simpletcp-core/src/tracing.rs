//! Logging setup for the `simpletcp` binary.
//!
//! Log lines always go to stderr, so stdout carries nothing but command
//! output. `RUST_LOG`, when set, replaces the default filter entirely.
//!
//! ```ignore
//! use simpletcp_core::tracing::{LogFormat, TracingConfig, init_tracing};
//!
//! init_tracing(TracingConfig::server(false).with_format(LogFormat::Json))?;
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt as layer_fmt, prelude::*};

/// Crate targets that log at the configured level. Everything else stays at
/// WARN unless `RUST_LOG` says otherwise.
const TARGETS: [&str; 5] = [
    "simpletcp",
    "simpletcp_core",
    "simpletcp_protocol",
    "simpletcp_server",
    "simpletcp_client",
];

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("unknown log format: {0} (expected pretty, compact or json)")]
    UnknownFormat(String),
}

/// How each log line is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, for reading a single session by eye.
    Pretty,
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

impl FromStr for LogFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(TracingError::UnknownFormat(s.to_string())),
        }
    }
}

/// Logging options for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Source file and line on every event.
    pub include_location: bool,
    pub include_timestamp: bool,
}

impl TracingConfig {
    /// Short-lived commands such as `connect` and `config`.
    ///
    /// Only warnings by default, since the session itself is printed on
    /// stdout; `debug` turns on everything down to DEBUG with locations.
    #[must_use]
    pub fn interactive(debug: bool) -> Self {
        Self {
            level: if debug { Level::DEBUG } else { Level::WARN },
            format: LogFormat::Compact,
            include_location: debug,
            include_timestamp: false,
        }
    }

    /// A long-running server: connection lifecycle at INFO, timestamped.
    #[must_use]
    pub fn server(debug: bool) -> Self {
        Self {
            level: if debug { Level::DEBUG } else { Level::INFO },
            format: LogFormat::Compact,
            include_location: debug,
            include_timestamp: true,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn default_directive(&self) -> String {
        TARGETS.iter().fold(Level::WARN.to_string(), |acc, target| {
            format!("{acc},{target}={}", self.level)
        })
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.default_directive())?,
    };

    let base = layer_fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let layer = match (config.format, config.include_timestamp) {
        (LogFormat::Pretty, true) => base.pretty().boxed(),
        (LogFormat::Pretty, false) => base.pretty().without_time().boxed(),
        (LogFormat::Compact, true) => base.compact().boxed(),
        (LogFormat::Compact, false) => base.compact().without_time().boxed(),
        // Log shippers want the timestamp regardless.
        (LogFormat::Json, _) => base.json().boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactive_is_quiet_unless_debugging() {
        let quiet = TracingConfig::interactive(false);
        assert_eq!(quiet.level, Level::WARN);
        assert!(!quiet.include_timestamp);
        assert!(!quiet.include_location);

        let debug = TracingConfig::interactive(true);
        assert_eq!(debug.level, Level::DEBUG);
        assert!(debug.include_location);
    }

    #[test]
    fn server_logs_lifecycle_with_timestamps() {
        let config = TracingConfig::server(false);
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.include_timestamp);

        let json = config.with_format(LogFormat::Json);
        assert_eq!(json.format, LogFormat::Json);
        assert_eq!(json.level, Level::INFO);
    }

    #[test]
    fn format_names() {
        for format in [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!(matches!(
            "xml".parse::<LogFormat>(),
            Err(TracingError::UnknownFormat(name)) if name == "xml"
        ));
    }

    #[test]
    fn default_directive_covers_every_crate() {
        let directive = TracingConfig::server(true).default_directive();
        assert!(directive.starts_with("WARN,"));
        for target in TARGETS {
            assert!(directive.contains(&format!("{target}=DEBUG")), "{target}");
        }
        assert!(EnvFilter::try_new(&directive).is_ok());
    }
}
