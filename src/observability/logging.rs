//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (pretty or JSON)
//! - Define the message codes every request/call event is logged under
//! - Define the [`EventSink`] contract the core logs through
//!
//! # Design Decisions
//! - Severity is derived from the message code, never chosen at the call site
//! - Every event carries correlation id, "METHOD path" and client IP;
//!   missing values render as `N/A`

use std::sync::{Mutex, PoisonError};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::context::{CorrelationContext, CorrelationId, PLACEHOLDER};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "upstream_relay={level},tower_http={level}",
            level = config.log_level
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}

/// Severity of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Identifier of every event the service logs.
///
/// The leading letter of the code fixes its severity: `I` info, `W` warn,
/// `E` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCode {
    RequestStart,
    RequestEnd,
    ExternalCallStart,
    ExternalCallEnd,
    BadRequest,
    ExternalCallCanceled,
    ExternalCallTimeout,
    ExternalConnectionError,
    ExternalReturnsError,
    PanicThrown,
    UnknownError,
}

impl MessageCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageCode::RequestStart => "I001-00001",
            MessageCode::RequestEnd => "I001-00002",
            MessageCode::ExternalCallStart => "I001-00003",
            MessageCode::ExternalCallEnd => "I001-00004",
            MessageCode::BadRequest => "I001-00010",
            MessageCode::ExternalCallCanceled => "W001-00011",
            MessageCode::ExternalCallTimeout => "W001-00012",
            MessageCode::ExternalConnectionError => "E001-00002",
            MessageCode::ExternalReturnsError => "E001-00003",
            MessageCode::PanicThrown => "E001-00004",
            MessageCode::UnknownError => "E001-00010",
        }
    }

    pub fn severity(&self) -> Severity {
        match self.as_str().as_bytes().first() {
            Some(b'W') => Severity::Warn,
            Some(b'E') => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for MessageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for request and call events.
pub trait EventSink: Send + Sync {
    /// Record one event. `correlation` is `None` outside a request scope.
    fn emit(&self, code: MessageCode, correlation: Option<&CorrelationContext>, message: &str);
}

/// Render correlation fields, substituting the placeholder when unset.
pub fn correlation_fields(correlation: Option<&CorrelationContext>) -> (String, &str, &str) {
    match correlation {
        Some(ctx) => (ctx.id().to_string(), ctx.method_path(), ctx.client_ip()),
        None => (PLACEHOLDER.to_string(), PLACEHOLDER, PLACEHOLDER),
    }
}

/// Sink that forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, code: MessageCode, correlation: Option<&CorrelationContext>, message: &str) {
        let (correlation_id, method_path, client_ip) = correlation_fields(correlation);
        let severity = code.severity();
        let code = code.as_str();
        match severity {
            Severity::Info => {
                tracing::info!(code, %correlation_id, method_path, client_ip, "{message}")
            }
            Severity::Warn => {
                tracing::warn!(code, %correlation_id, method_path, client_ip, "{message}")
            }
            Severity::Error => {
                tracing::error!(code, %correlation_id, method_path, client_ip, "{message}")
            }
        }
    }
}

/// One event captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    pub code: MessageCode,
    pub correlation_id: Option<CorrelationId>,
    pub message: String,
}

/// Sink that keeps events in memory, for diagnostics and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LoggedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event recorded so far, in emission order.
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, code: MessageCode) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.code == code)
            .count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, code: MessageCode, correlation: Option<&CorrelationContext>, message: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LoggedEvent {
                code,
                correlation_id: correlation.map(CorrelationContext::id),
                message: message.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_code_prefix() {
        assert_eq!(MessageCode::ExternalCallStart.severity(), Severity::Info);
        assert_eq!(MessageCode::ExternalCallEnd.severity(), Severity::Info);
        assert_eq!(MessageCode::ExternalCallTimeout.severity(), Severity::Warn);
        assert_eq!(MessageCode::ExternalCallCanceled.severity(), Severity::Warn);
        assert_eq!(MessageCode::ExternalConnectionError.severity(), Severity::Error);
        assert_eq!(MessageCode::ExternalReturnsError.severity(), Severity::Error);
        assert_eq!(MessageCode::PanicThrown.severity(), Severity::Error);
    }

    #[test]
    fn test_fields_without_correlation_use_placeholder() {
        let (id, method_path, client_ip) = correlation_fields(None);
        assert_eq!(id, "N/A");
        assert_eq!(method_path, "N/A");
        assert_eq!(client_ip, "N/A");
    }

    #[test]
    fn test_tracing_sink_handles_missing_correlation() {
        // No subscriber installed: emitting must still be a no-op, not a panic.
        TracingSink.emit(MessageCode::UnknownError, None, "outside request scope");
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        let ctx = CorrelationContext::for_request("GET", "/external", "127.0.0.1");
        sink.emit(MessageCode::ExternalCallStart, Some(&ctx), "start");
        sink.emit(MessageCode::ExternalCallEnd, None, "end");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].correlation_id, Some(ctx.id()));
        assert_eq!(events[1].correlation_id, None);
        assert_eq!(sink.count(MessageCode::ExternalCallEnd), 1);
    }
}
