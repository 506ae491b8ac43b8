//! Configuration commands.

use crate::config::Settings;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(settings: &Settings) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(settings)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", Settings::default_path().display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(settings: &Settings) -> ClientResult<()> {
    settings.validate()?;
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ClientResult<()> {
    println!("config: {}", Settings::default_path().display());
    Ok(())
}
