//! Command-line interface definition.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use simpletcp_core::LogFormat;
use simpletcp_protocol::TextCodec;

/// simpletcp - framed text messaging over TCP
#[derive(Debug, Parser)]
#[command(name = "simpletcp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "SIMPLETCP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Text codec (utf-8, utf-16le, utf-16be, utf-7, utf-32, ascii)
    #[arg(long, global = true)]
    pub codec: Option<TextCodec>,

    /// Log line format on stderr (pretty, compact, json)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a server in the foreground
    Serve {
        /// Port to listen on
        #[arg(long, short)]
        port: Option<u16>,

        /// Address to listen on
        #[arg(long)]
        bind: Option<IpAddr>,

        /// Send every message back to the client it came from
        #[arg(long)]
        echo: bool,
    },

    /// Connect to a server, sending stdin lines and printing replies
    Connect {
        /// Server host name or address
        host: String,

        /// Server port
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_serve() {
        let cli = Cli::parse_from(["simpletcp", "serve", "--port", "4000", "--echo"]);
        match cli.command {
            Command::Serve { port, bind, echo } => {
                assert_eq!(port, Some(4000));
                assert_eq!(bind, None);
                assert!(echo);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_connect_with_codec() {
        let cli = Cli::parse_from(["simpletcp", "connect", "localhost", "--codec", "UTF-16LE"]);
        assert_eq!(cli.codec, Some(TextCodec::Utf16Le));
        match cli.command {
            Command::Connect { host, port } => {
                assert_eq!(host, "localhost");
                assert_eq!(port, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_log_format() {
        let cli = Cli::parse_from(["simpletcp", "serve", "--log-format", "json"]);
        assert_eq!(cli.log_format, Some(LogFormat::Json));

        let cli = Cli::parse_from(["simpletcp", "config", "dump"]);
        assert_eq!(cli.log_format, None);

        let result = Cli::try_parse_from(["simpletcp", "--log-format", "xml", "config", "path"]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_codec_is_a_usage_error() {
        let result = Cli::try_parse_from(["simpletcp", "--codec", "rot13", "config", "path"]);
        assert!(result.is_err());
    }
}
