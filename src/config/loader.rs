//! Configuration loading and management
//!
//! This module handles loading configuration from files and environment variables.

use std::path::Path;

use tracing::{debug, info};

use super::types::Config;
use crate::error::ConfigError;

/// Environment variable overriding `log.level`
pub const ENV_LOG_LEVEL: &str = "FLOW_SNIFFER_LOG_LEVEL";
/// Environment variable overriding `sniff.max_bytes`
pub const ENV_MAX_BYTES: &str = "FLOW_SNIFFER_MAX_BYTES";
/// Environment variable overriding `fakedns.enabled`
pub const ENV_FAKEDNS: &str = "FLOW_SNIFFER_FAKEDNS";

/// Load configuration from a JSON file
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    debug!("Loading configuration from {:?}", path);

    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let contents = std::fs::read_to_string(path)?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| {
        ConfigError::ParseError(format!("Failed to parse JSON: {e} at {path:?}"))
    })?;

    config.validate()?;

    info!(
        "Configuration loaded: sniffing {} on {:?}, fakedns {}",
        if config.sniff.enabled { "enabled" } else { "disabled" },
        config.sniff.networks,
        if config.fakedns.enabled { "enabled" } else { "disabled" },
    );

    Ok(config)
}

/// Load configuration from a JSON string
///
/// # Errors
///
/// Returns `ConfigError` if parsing or validation fails.
pub fn load_config_str(json: &str) -> Result<Config, ConfigError> {
    let config: Config =
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.validate()?;

    Ok(config)
}

/// Load configuration with environment variable overrides
///
/// Environment variables:
/// - `FLOW_SNIFFER_LOG_LEVEL`: Override log level
/// - `FLOW_SNIFFER_MAX_BYTES`: Override the sniffing byte budget
/// - `FLOW_SNIFFER_FAKEDNS`: Enable (`true`) or disable (`false`) fake DNS
///
/// # Errors
///
/// Returns `ConfigError` if loading, parsing or an override fails.
pub fn load_config_with_env(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Apply overrides from a variable lookup, then re-validate
///
/// # Errors
///
/// Returns `ConfigError::EnvError` for unparsable values and
/// `ConfigError::ValidationError` if the result is invalid.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.log.level = level;
        debug!("Log level overridden to {}", config.log.level);
    }

    if let Some(max) = lookup(ENV_MAX_BYTES) {
        config.sniff.max_bytes = max
            .parse()
            .map_err(|_| ConfigError::env(ENV_MAX_BYTES, format!("Invalid number: {max}")))?;
        debug!("Sniff byte budget overridden to {}", config.sniff.max_bytes);
    }

    if let Some(enabled) = lookup(ENV_FAKEDNS) {
        config.fakedns.enabled = enabled
            .parse()
            .map_err(|_| ConfigError::env(ENV_FAKEDNS, format!("Invalid boolean: {enabled}")))?;
        debug!("FakeDNS overridden to {}", config.fakedns.enabled);
    }

    // Re-validate after overrides
    config.validate()
}

/// Create a default configuration file at the given path
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be written.
pub fn create_default_config(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let config = Config::default_config();
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {e}")))?;

    std::fs::write(path, json)?;
    Ok(())
}
