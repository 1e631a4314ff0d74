//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read configuration from a TOML file without validating it.
///
/// Use this when environment overrides still have to be applied.
pub fn read_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment values on top of a configuration.
///
/// `lookup` resolves a variable name; pass `|k| std::env::var(k).ok()` in
/// production. The result is not validated; call [`validate_config`] after.
pub fn apply_env_overrides<F>(
    mut config: ServiceConfig,
    lookup: F,
) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(base_url) = lookup("BASE_URL") {
        config.upstream.base_url = Some(base_url);
    }
    if let Some(bind_address) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = bind_address;
    }
    if let Some(value) = lookup("UPSTREAM_TIMEOUT_MS") {
        config.upstream.call_timeout_ms = value.trim().parse().map_err(|_| ConfigError::Env {
            var: "UPSTREAM_TIMEOUT_MS",
            value,
        })?;
    }
    Ok(config)
}
