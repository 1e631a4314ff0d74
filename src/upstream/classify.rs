//! Failure classification.
//!
//! A pure mapping from low-level failure signals to [`OutcomeKind`]. Deadline
//! expiry, cancellation and transport failure stay distinct because callers
//! log and render each differently.
//!
//! Only the context deadline yields [`OutcomeKind::Timeout`]. A transport
//! error that reqwest itself reports as timed out (the connect timeout) is
//! still a failure to reach the upstream.

use crate::context::DoneReason;
use crate::upstream::outcome::OutcomeKind;

/// Low-level signal observed while resolving one outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSignal {
    /// The call's context deadline passed.
    DeadlineExceeded,
    /// The call's context was explicitly canceled.
    Canceled,
    /// The transport failed before a response arrived (DNS, connect, I/O).
    Transport,
    /// A response arrived with this status code.
    Status(u16),
}

impl From<&DoneReason> for FailureSignal {
    fn from(reason: &DoneReason) -> Self {
        match reason {
            DoneReason::DeadlineExceeded => FailureSignal::DeadlineExceeded,
            DoneReason::Canceled(_) => FailureSignal::Canceled,
        }
    }
}

impl From<&reqwest::Error> for FailureSignal {
    fn from(_: &reqwest::Error) -> Self {
        FailureSignal::Transport
    }
}

/// Classify a signal. Statuses below 400 are successes.
pub fn classify(signal: &FailureSignal) -> OutcomeKind {
    match signal {
        FailureSignal::DeadlineExceeded => OutcomeKind::Timeout,
        FailureSignal::Canceled => OutcomeKind::Canceled,
        FailureSignal::Transport => OutcomeKind::ConnectionError,
        FailureSignal::Status(status) if *status >= 400 => OutcomeKind::UpstreamError,
        FailureSignal::Status(_) => OutcomeKind::Success,
    }
}
