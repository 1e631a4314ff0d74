//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require an absolute http(s) upstream base URL
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.base_url is not set")]
    MissingBaseUrl,

    #[error("upstream.base_url '{url}' is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("upstream.call_timeout_ms must be greater than zero")]
    ZeroCallTimeout,

    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.log_format '{0}' is not one of: pretty, json")]
    UnknownLogFormat(String),

    #[error("timeouts.request_secs ({request_secs}s) must exceed upstream.call_timeout_ms ({call_timeout_ms}ms)")]
    RequestTimeoutTooShort { request_secs: u64, call_timeout_ms: u64 },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.upstream.base_url.as_deref().map(str::trim) {
        None | Some("") => errors.push(ValidationError::MissingBaseUrl),
        Some(raw) => {
            if let Err(reason) = check_base_url(raw) {
                errors.push(ValidationError::InvalidBaseUrl {
                    url: raw.to_string(),
                    reason,
                });
            }
        }
    }

    if config.upstream.call_timeout_ms == 0 {
        errors.push(ValidationError::ZeroCallTimeout);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::UnknownLogFormat(
            config.observability.log_format.clone(),
        ));
    }

    let request_ms = config.timeouts.request_secs.saturating_mul(1000);
    if config.upstream.call_timeout_ms > 0 && request_ms <= config.upstream.call_timeout_ms {
        errors.push(ValidationError::RequestTimeoutTooShort {
            request_secs: config.timeouts.request_secs,
            call_timeout_ms: config.upstream.call_timeout_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check that a base URL is absolute, http(s) and has a host.
pub fn check_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(url)
}
