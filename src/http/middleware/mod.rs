//! Axum middleware applied to every route.

pub mod correlation;

pub use correlation::{client_ip, correlation_middleware, X_CORRELATION_ID};
