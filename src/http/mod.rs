//! HTTP boundary subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → middleware/correlation.rs (correlation context, start/end events)
//!     → handlers.rs (build CallContext, call the posts service)
//!     → response.rs ({"data": ...} or {"error": code} with mapped status)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod server;

pub use middleware::X_CORRELATION_ID;
pub use response::{ApiError, Data};
pub use server::{AppState, HttpServer};
