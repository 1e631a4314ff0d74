//! Outbound call subsystem.
//!
//! # Data Flow
//! ```text
//! Handler (CallContext carrying the correlation)
//!     → aggregator.rs (one call inline, or N calls under a shared cancel scope)
//!     → caller.rs (per-call deadline, HTTP request, JSON decode)
//!     → classify.rs (deadline / cancel / transport / status → OutcomeKind)
//!     → outcome.rs (CallOutcome per call)
//!     → error.rs (first failure → ExternalApiError)
//! ```
//!
//! # Design Decisions
//! - No retries, no circuit breaking: every failure is reported as-is
//! - The first failure cancels in-flight siblings; later results are discarded
//! - Classification is pure so it can be tested without a network

pub mod aggregator;
pub mod caller;
pub mod classify;
pub mod error;
pub mod outcome;
pub mod request;

pub use aggregator::{CallSpec, FanOutAggregator};
pub use caller::{BoundedCaller, SetupError};
pub use classify::{classify, FailureSignal};
pub use error::{user_message, ErrorClass, ErrorKind, ExternalApiError};
pub use outcome::{body_preview, CallOutcome, OutcomeKind};
pub use request::UpstreamRequest;
