//! Externally visible error taxonomy.
//!
//! # Responsibilities
//! - Map the first failing call's outcome onto one of three error variants
//! - Expose the classification (`kind`, `class`, message code) used by the
//!   HTTP boundary and by logging
//! - Render user-facing messages from the kind alone

use thiserror::Error;

use crate::observability::{MessageCode, Severity};

/// Fine-grained error kind, one per loggable failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectionError,
    UpstreamTimeout,
    UpstreamCanceled,
    UpstreamError,
}

impl ErrorKind {
    pub fn code(&self) -> MessageCode {
        match self {
            ErrorKind::ConnectionError => MessageCode::ExternalConnectionError,
            ErrorKind::UpstreamTimeout => MessageCode::ExternalCallTimeout,
            ErrorKind::UpstreamCanceled => MessageCode::ExternalCallCanceled,
            ErrorKind::UpstreamError => MessageCode::ExternalReturnsError,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::ConnectionError
            | ErrorKind::UpstreamTimeout
            | ErrorKind::UpstreamCanceled => ErrorClass::Unavailable,
            ErrorKind::UpstreamError => ErrorClass::Rejected,
        }
    }

    pub fn severity(&self) -> Severity {
        self.code().severity()
    }
}

/// Coarse class driving the inbound response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The upstream could not be reached, or not in time.
    Unavailable,
    /// The upstream answered with an error status or an unusable body.
    Rejected,
}

/// User-facing message for a kind.
pub fn user_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ConnectionError => "could not reach upstream",
        ErrorKind::UpstreamTimeout | ErrorKind::UpstreamCanceled => "upstream unreachable in time",
        ErrorKind::UpstreamError => "upstream returned an error",
    }
}

/// Failure of an outbound operation, as seen by callers of the aggregator.
///
/// `endpoint` is the rendered request (`GET <url>`) of the call that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalApiError {
    #[error("{}: {endpoint}: {cause}", user_message(ErrorKind::ConnectionError))]
    Unreachable { endpoint: String, cause: String },

    #[error("{}: {endpoint}: {cause}", user_message(ErrorKind::UpstreamTimeout))]
    NotInTime {
        endpoint: String,
        cause: String,
        /// Canceled (sibling failure or caller) rather than timed out.
        canceled: bool,
    },

    #[error("{}: {endpoint}: status {status}: {body}", user_message(ErrorKind::UpstreamError))]
    Rejected { endpoint: String, status: u16, body: String },
}

impl ExternalApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExternalApiError::Unreachable { .. } => ErrorKind::ConnectionError,
            ExternalApiError::NotInTime { canceled: false, .. } => ErrorKind::UpstreamTimeout,
            ExternalApiError::NotInTime { canceled: true, .. } => ErrorKind::UpstreamCanceled,
            ExternalApiError::Rejected { .. } => ErrorKind::UpstreamError,
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind().class()
    }

    pub fn code(&self) -> MessageCode {
        self.kind().code()
    }

    pub fn endpoint(&self) -> &str {
        match self {
            ExternalApiError::Unreachable { endpoint, .. }
            | ExternalApiError::NotInTime { endpoint, .. }
            | ExternalApiError::Rejected { endpoint, .. } => endpoint,
        }
    }

    /// Upstream status code, for rejections.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExternalApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert_eq!(ErrorKind::ConnectionError.class(), ErrorClass::Unavailable);
        assert_eq!(ErrorKind::UpstreamTimeout.class(), ErrorClass::Unavailable);
        assert_eq!(ErrorKind::UpstreamCanceled.class(), ErrorClass::Unavailable);
        assert_eq!(ErrorKind::UpstreamError.class(), ErrorClass::Rejected);
    }

    #[test]
    fn test_codes_and_severity() {
        assert_eq!(ErrorKind::ConnectionError.code().as_str(), "E001-00002");
        assert_eq!(ErrorKind::UpstreamError.code().as_str(), "E001-00003");
        assert_eq!(ErrorKind::UpstreamCanceled.code().as_str(), "W001-00011");
        assert_eq!(ErrorKind::UpstreamTimeout.code().as_str(), "W001-00012");
        assert_eq!(ErrorKind::UpstreamTimeout.severity(), Severity::Warn);
        assert_eq!(ErrorKind::ConnectionError.severity(), Severity::Error);
    }

    #[test]
    fn test_not_in_time_distinguishes_cancel() {
        let timeout = ExternalApiError::NotInTime {
            endpoint: "GET http://upstream/posts".into(),
            cause: "deadline exceeded".into(),
            canceled: false,
        };
        let canceled = ExternalApiError::NotInTime {
            endpoint: "GET http://upstream/posts".into(),
            cause: "sibling failed".into(),
            canceled: true,
        };
        assert_eq!(timeout.kind(), ErrorKind::UpstreamTimeout);
        assert_eq!(canceled.kind(), ErrorKind::UpstreamCanceled);
        assert_eq!(timeout.class(), canceled.class());
    }

    #[test]
    fn test_display_uses_user_message() {
        let err = ExternalApiError::Rejected {
            endpoint: "GET http://upstream/posts".into(),
            status: 400,
            body: "{\"message\":\"bad\"}".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("upstream returned an error"));
        assert!(rendered.contains("status 400"));
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.endpoint(), "GET http://upstream/posts");
    }
}
