//! simpletcp CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use simpletcp_client::cli::{Cli, Command, ConfigAction};
use simpletcp_client::commands;
use simpletcp_client::config::Settings;
use simpletcp_client::error::ClientResult;
use simpletcp_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut tracing_config = match cli.command {
        Command::Serve { .. } => TracingConfig::server(cli.debug),
        _ => TracingConfig::interactive(cli.debug),
    };
    if let Some(format) = cli.log_format {
        tracing_config = tracing_config.with_format(format);
    }
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let mut settings = match cli.config {
        Some(ref path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(codec) = cli.codec {
        settings.transport.codec = codec;
    }

    match cli.command {
        Command::Serve { port, bind, echo } => {
            settings.validate()?;
            commands::serve::run(&settings, port, bind, echo).await
        }
        Command::Connect { ref host, port } => {
            settings.validate()?;
            commands::connect::run(&settings, host, port).await
        }
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&settings),
            ConfigAction::Validate => commands::config::validate(&settings),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
