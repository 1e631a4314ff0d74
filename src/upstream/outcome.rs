//! Per-call outcome type.

use std::fmt;

use crate::context::DoneReason;
use crate::observability::MessageCode;
use crate::upstream::classify::{classify, FailureSignal};
use crate::upstream::error::ExternalApiError;

/// Kind of a [`CallOutcome`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    ConnectionError,
    Timeout,
    Canceled,
    UpstreamError,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::ConnectionError => "connection_error",
            OutcomeKind::Timeout => "timeout",
            OutcomeKind::Canceled => "canceled",
            OutcomeKind::UpstreamError => "upstream_error",
        }
    }

    /// Code of the call-end event logged for this kind.
    pub fn end_code(&self) -> MessageCode {
        match self {
            OutcomeKind::Success => MessageCode::ExternalCallEnd,
            OutcomeKind::ConnectionError => MessageCode::ExternalConnectionError,
            OutcomeKind::Timeout => MessageCode::ExternalCallTimeout,
            OutcomeKind::Canceled => MessageCode::ExternalCallCanceled,
            OutcomeKind::UpstreamError => MessageCode::ExternalReturnsError,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of exactly one bounded outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    Success(T),
    ConnectionError { cause: String },
    Timeout { cause: String },
    Canceled { cause: String },
    UpstreamError { status: u16, body: String },
}

impl<T> CallOutcome<T> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            CallOutcome::Success(_) => OutcomeKind::Success,
            CallOutcome::ConnectionError { .. } => OutcomeKind::ConnectionError,
            CallOutcome::Timeout { .. } => OutcomeKind::Timeout,
            CallOutcome::Canceled { .. } => OutcomeKind::Canceled,
            CallOutcome::UpstreamError { .. } => OutcomeKind::UpstreamError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    /// Transform the success payload, leaving failures untouched.
    pub fn map<U, F>(self, f: F) -> CallOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            CallOutcome::Success(value) => CallOutcome::Success(f(value)),
            CallOutcome::ConnectionError { cause } => CallOutcome::ConnectionError { cause },
            CallOutcome::Timeout { cause } => CallOutcome::Timeout { cause },
            CallOutcome::Canceled { cause } => CallOutcome::Canceled { cause },
            CallOutcome::UpstreamError { status, body } => {
                CallOutcome::UpstreamError { status, body }
            }
        }
    }

    /// Outcome for a call whose context finished before it did.
    pub fn from_done(reason: &DoneReason) -> Self {
        match (classify(&FailureSignal::from(reason)), reason) {
            (OutcomeKind::Canceled, DoneReason::Canceled(cause)) => CallOutcome::Canceled {
                cause: cause.to_string(),
            },
            _ => CallOutcome::Timeout {
                cause: "deadline exceeded".to_string(),
            },
        }
    }

    /// Outcome for a transport failure while the context was still live.
    ///
    /// A connect attempt that ran out its own timeout is still a connection
    /// error; only the context deadline produces [`CallOutcome::Timeout`].
    pub fn from_transport(error: &reqwest::Error) -> Self {
        CallOutcome::ConnectionError {
            cause: error_chain(error),
        }
    }

    /// Convert into the externally visible error taxonomy.
    pub fn into_result(self, endpoint: impl Into<String>) -> Result<T, ExternalApiError> {
        let endpoint = endpoint.into();
        match self {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::ConnectionError { cause } => {
                Err(ExternalApiError::Unreachable { endpoint, cause })
            }
            CallOutcome::Timeout { cause } => Err(ExternalApiError::NotInTime {
                endpoint,
                cause,
                canceled: false,
            }),
            CallOutcome::Canceled { cause } => Err(ExternalApiError::NotInTime {
                endpoint,
                cause,
                canceled: true,
            }),
            CallOutcome::UpstreamError { status, body } => Err(ExternalApiError::Rejected {
                endpoint,
                status,
                body,
            }),
        }
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        source = inner.source();
    }
    rendered
}

/// Whitespace-compacted, length-bounded rendering of a response body.
pub fn body_preview(body: &[u8], limit: usize) -> String {
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(limit).collect::<String>();
    if compact.chars().count() > limit {
        format!("{preview}...")
    } else {
        preview
    }
}
