//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http middleware, bounded caller, aggregator produce:
//!     → logging.rs (EventSink: one coded event per start/end/failure)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → tracing subscriber (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Correlation id flows through every event of a request
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{
    init_logging, EventSink, LoggedEvent, MemorySink, MessageCode, Severity, TracingSink,
};
