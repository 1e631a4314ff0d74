//! Upstream relay library.
//!
//! An HTTP service that answers inbound requests by calling an upstream JSON
//! API, either once or as a concurrent fan-out, under per-call deadlines and
//! first-failure cancellation.

// Core subsystems
pub mod config;
pub mod context;
pub mod http;
pub mod posts;
pub mod upstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
