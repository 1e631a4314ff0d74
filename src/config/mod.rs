//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: BASE_URL, BIND_ADDRESS, ...)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → handed by value to the subsystems built at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs, except the upstream
//!   base URL, whose absence is a startup failure
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, parse_config, read_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, ServiceConfig, TimeoutConfig, UpstreamConfig};
pub use validation::{validate_config, ValidationError};
