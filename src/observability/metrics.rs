//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): inbound requests by method, status
//! - `http_request_duration_seconds` (histogram): inbound latency by method
//! - `upstream_calls_total` (counter): outbound calls by call name, outcome
//! - `upstream_call_duration_seconds` (histogram): outbound latency
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   library users pay nothing
//! - Labels are bounded: call names are static, never raw URLs

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one completed inbound request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("http_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record one resolved outbound call.
pub fn record_upstream_call(call: &'static str, outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!("upstream_calls_total", "call" => call, "outcome" => outcome).increment(1);
    ::metrics::histogram!("upstream_call_duration_seconds", "call" => call, "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}
