//! Configuration parser and validation

use crate::{ConfigError, EnvironmentConfig, Result};
use std::path::Path;

/// Distributions with a known profile
pub const KNOWN_DISTRIBUTIONS: &[&str] = &["ubuntu", "debian", "centos", "scientificlinux"];

/// Parse a YAML configuration file
pub fn parse_file(path: impl AsRef<Path>) -> Result<EnvironmentConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML configuration from a string
pub fn parse_str(content: &str) -> Result<EnvironmentConfig> {
    let config: EnvironmentConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
fn validate_config(config: &EnvironmentConfig) -> Result<()> {
    if config.version != "1.0" {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported version: {}, expected 1.0",
            config.version
        )));
    }

    if !KNOWN_DISTRIBUTIONS.contains(&config.distribution.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "Unknown distribution '{}', expected one of: {}",
            config.distribution,
            KNOWN_DISTRIBUTIONS.join(", ")
        )));
    }

    if !config.system_install.starts_with('/') {
        return Err(ConfigError::ValidationError(format!(
            "system_install must be an absolute path, got '{}'",
            config.system_install
        )));
    }

    let home_relative = [("local_install", Some(&config.local_install)), ("data_files", config.data_files.as_ref())];
    for (key, value) in home_relative {
        if let Some(value) = value {
            if !value.starts_with('/') && !value.starts_with('~') {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be absolute or start with '~', got '{}'",
                    key, value
                )));
            }
        }
    }

    if config.target.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "target.host must not be empty".to_string(),
        ));
    }

    if config.command_timeout == Some(0) {
        return Err(ConfigError::ValidationError(
            "command_timeout must be at least one second".to_string(),
        ));
    }

    Ok(())
}
