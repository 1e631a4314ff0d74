//! Request-scoped context subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request (http middleware)
//!     → correlation.rs (CorrelationContext: id, "METHOD path", client IP)
//!     → call.rs (CallContext::for_request)
//!     → aggregator derives a cancellable child per fan-out
//!     → caller derives a deadline-bound child per outbound call
//!     → every log line reads the same CorrelationContext
//! ```
//!
//! # Design Decisions
//! - Correlation metadata is a typed value, never looked up by string key
//! - Contexts are threaded as explicit parameters, including into spawned tasks
//! - Derivation only tightens: deadlines never extend, cancellation never
//!   propagates upward

pub mod call;
pub mod correlation;

pub use call::{CallContext, CancelCause, Canceller, ContextError, DoneReason};
pub use correlation::{CorrelationContext, CorrelationId, PLACEHOLDER};
