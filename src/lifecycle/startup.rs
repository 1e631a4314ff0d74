//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve configuration: file (optional) → environment → validation
//! - Initialize logging and metrics
//! - Build the HTTP server, bind the listener, serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A missing or invalid upstream base URL aborts before binding
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{apply_env_overrides, read_config, validate_config, ConfigError, ServiceConfig};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::{init_logging, metrics};
use crate::upstream::SetupError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("failed to initialize metrics: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to set up upstream client: {0}")]
    Setup(#[from] SetupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve the effective configuration.
///
/// Without a file every field starts from its default. `lookup` resolves
/// environment variables.
pub fn resolve_config<F>(path: Option<&Path>, lookup: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match path {
        Some(path) => read_config(path)?,
        None => ServiceConfig::default(),
    };
    let config = apply_env_overrides(config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Initialize observability, then serve until `shutdown` fires.
pub async fn run(config: ServiceConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    init_logging(&config.observability)?;
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let raw = &config.observability.metrics_address;
        let addr: SocketAddr = raw
            .parse()
            .map_err(|_| StartupError::MetricsAddress(raw.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;
    let listener = TcpListener::bind(&bind_address).await?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
