//! Bounded outbound caller.
//!
//! # Responsibilities
//! - Issue one HTTP request to the upstream under a derived deadline
//! - Race the request against the caller's cancellation and deadline
//! - Decode success bodies into the requested type
//! - Log exactly one start and one end event per issued call
//!
//! # Design Decisions
//! - Never retries; every failure surfaces as a [`CallOutcome`]
//! - A context that is already done short-circuits before any I/O
//! - A call dropped mid-flight still logs its end event, as canceled
//! - Non-2xx bodies are kept as bounded, whitespace-compacted text

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::validation::check_base_url;
use crate::config::UpstreamConfig;
use crate::context::{CallContext, DoneReason};
use crate::observability::{metrics, EventSink, MessageCode};
use crate::upstream::classify::{classify, FailureSignal};
use crate::upstream::outcome::{body_preview, CallOutcome, OutcomeKind};
use crate::upstream::request::UpstreamRequest;

/// Status reported when a 2xx body cannot be decoded.
const DECODE_FAILURE_STATUS: u16 = 502;

/// Errors building a [`BoundedCaller`].
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("upstream base URL is not configured")]
    MissingBaseUrl,

    #[error("upstream base URL '{url}' is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Issues single outbound calls bounded by a per-call timeout.
pub struct BoundedCaller {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    max_error_body_chars: usize,
    sink: Arc<dyn EventSink>,
}

impl BoundedCaller {
    pub fn new(config: &UpstreamConfig, sink: Arc<dyn EventSink>) -> Result<Self, SetupError> {
        let raw = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or(SetupError::MissingBaseUrl)?;
        let base_url = check_base_url(raw).map_err(|reason| SetupError::InvalidBaseUrl {
            url: raw.to_string(),
            reason,
        })?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout: config.call_timeout(),
            max_error_body_chars: config.max_error_body_chars,
            sink,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Resolve `path` (e.g. `users/1`) against the base URL.
    ///
    /// A trailing slash on the base is optional.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|segment| !segment.is_empty()));
        }
        url
    }

    /// Perform one call and decode a success body as `T`.
    pub async fn call<T>(&self, ctx: &CallContext, request: &UpstreamRequest) -> CallOutcome<T>
    where
        T: DeserializeOwned,
    {
        let started = Instant::now();

        if let Some(reason) = ctx.is_done() {
            let outcome = CallOutcome::from_done(&reason);
            self.finish(ctx, request, &outcome, started.elapsed(), false);
            return outcome;
        }

        self.sink.emit(
            MessageCode::ExternalCallStart,
            ctx.correlation(),
            &format!("Request:{request}"),
        );

        let bounded = ctx.with_timeout(self.timeout);
        let in_flight = InFlight {
            caller: self,
            ctx,
            bounded: &bounded,
            request,
            started,
            settled: false,
        };
        let outcome = tokio::select! {
            biased;
            reason = bounded.done() => CallOutcome::from_done(&reason),
            result = self.execute::<T>(request) => match result {
                Ok(outcome) => outcome,
                // The context verdict wins over whatever the transport reported.
                Err(error) => match bounded.is_done() {
                    Some(reason) => CallOutcome::from_done(&reason),
                    None => CallOutcome::from_transport(&error),
                },
            },
        };

        in_flight.settle(&outcome);
        outcome
    }

    async fn execute<T>(&self, request: &UpstreamRequest) -> Result<CallOutcome<T>, reqwest::Error>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .request(request.method().clone(), request.url().clone())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        let outcome = match classify(&FailureSignal::Status(status)) {
            OutcomeKind::Success => match serde_json::from_slice::<T>(&body) {
                Ok(value) => CallOutcome::Success(value),
                Err(error) => CallOutcome::UpstreamError {
                    status: DECODE_FAILURE_STATUS,
                    body: format!("invalid JSON payload: {error}"),
                },
            },
            _ => CallOutcome::UpstreamError {
                status,
                body: body_preview(&body, self.max_error_body_chars),
            },
        };
        Ok(outcome)
    }

    fn finish<T>(
        &self,
        ctx: &CallContext,
        request: &UpstreamRequest,
        outcome: &CallOutcome<T>,
        elapsed: Duration,
        issued: bool,
    ) {
        let kind = outcome.kind();
        let elapsed_ms = elapsed.as_millis();
        let message = match outcome {
            CallOutcome::Success(_) => {
                format!("Success Request:{request} elapsed_ms:{elapsed_ms}")
            }
            CallOutcome::UpstreamError { status, body } => format!(
                "HTTP status error Request:{request} StatusCode:{status} \
                 ErrorResponse:{body} elapsed_ms:{elapsed_ms}"
            ),
            CallOutcome::ConnectionError { cause }
            | CallOutcome::Timeout { cause }
            | CallOutcome::Canceled { cause } if issued => {
                format!("{kind} Request:{request} Cause:{cause} elapsed_ms:{elapsed_ms}")
            }
            CallOutcome::ConnectionError { cause }
            | CallOutcome::Timeout { cause }
            | CallOutcome::Canceled { cause } => {
                format!("{kind} before issue Request:{request} Cause:{cause}")
            }
        };
        self.sink.emit(kind.end_code(), ctx.correlation(), &message);
        metrics::record_upstream_call(request.name(), kind.as_str(), elapsed);
    }
}

/// An issued call whose end event is still owed.
struct InFlight<'a> {
    caller: &'a BoundedCaller,
    ctx: &'a CallContext,
    bounded: &'a CallContext,
    request: &'a UpstreamRequest,
    started: Instant,
    settled: bool,
}

impl InFlight<'_> {
    fn settle<T>(mut self, outcome: &CallOutcome<T>) {
        self.settled = true;
        self.caller
            .finish(self.ctx, self.request, outcome, self.started.elapsed(), true);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let cause = match self.bounded.is_done() {
            Some(DoneReason::Canceled(cause)) => cause.to_string(),
            _ => "call dropped before completion".to_string(),
        };
        let outcome: CallOutcome<()> = CallOutcome::Canceled { cause };
        self.caller
            .finish(self.ctx, self.request, &outcome, self.started.elapsed(), true);
    }
}

impl std::fmt::Debug for BoundedCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCaller")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("max_error_body_chars", &self.max_error_body_chars)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CancelCause, CorrelationContext};
    use crate::observability::MemorySink;

    fn config(base_url: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            base_url: base_url.map(str::to_string),
            ..UpstreamConfig::default()
        }
    }

    fn build(base_url: &str) -> (BoundedCaller, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let caller = BoundedCaller::new(&config(Some(base_url)), sink.clone()).unwrap();
        (caller, sink)
    }

    #[test]
    fn test_new_requires_base_url() {
        let sink = Arc::new(MemorySink::new());
        assert!(matches!(
            BoundedCaller::new(&config(None), sink.clone()),
            Err(SetupError::MissingBaseUrl)
        ));
        assert!(matches!(
            BoundedCaller::new(&config(Some("  ")), sink.clone()),
            Err(SetupError::MissingBaseUrl)
        ));
        assert!(matches!(
            BoundedCaller::new(&config(Some("ftp://upstream")), sink),
            Err(SetupError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let (caller, _) = build("http://upstream.local:8081");
        assert_eq!(
            caller.endpoint("posts").as_str(),
            "http://upstream.local:8081/posts"
        );

        let (caller, _) = build("http://upstream.local/api/");
        assert_eq!(
            caller.endpoint("users/1").as_str(),
            "http://upstream.local/api/users/1"
        );

        let (caller, _) = build("http://upstream.local/api");
        assert_eq!(
            caller.endpoint("/posts").as_str(),
            "http://upstream.local/api/posts"
        );
    }

    #[tokio::test]
    async fn test_done_context_short_circuits() {
        // Port 9 is never contacted: the context is canceled up front.
        let (caller, sink) = build("http://127.0.0.1:9");
        let correlation = CorrelationContext::for_request("GET", "/external", "127.0.0.1");
        let (ctx, canceller) = CallContext::for_request(correlation).with_cancel();
        canceller.cancel(CancelCause::Requested("client went away".into()));

        let request = UpstreamRequest::get("posts", caller.endpoint("posts"));
        let outcome = caller.call::<serde_json::Value>(&ctx, &request).await;

        assert_eq!(outcome.kind(), OutcomeKind::Canceled);
        assert_eq!(sink.count(MessageCode::ExternalCallStart), 0);
        assert_eq!(sink.count(MessageCode::ExternalCallCanceled), 1);
        let events = sink.events();
        assert_eq!(events[0].correlation_id, ctx.correlation().map(|c| c.id()));
    }

    #[tokio::test]
    async fn test_expired_deadline_is_timeout() {
        let (caller, sink) = build("http://127.0.0.1:9");
        let ctx = CallContext::background().with_timeout(Duration::ZERO);

        let request = UpstreamRequest::get("posts", caller.endpoint("posts"));
        let outcome = caller.call::<serde_json::Value>(&ctx, &request).await;

        assert_eq!(outcome.kind(), OutcomeKind::Timeout);
        assert_eq!(sink.count(MessageCode::ExternalCallTimeout), 1);
    }

    #[tokio::test]
    async fn test_dropped_call_logs_canceled_end() {
        // Accepts and holds connections without ever answering.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let (caller, sink) = build(&format!("http://{addr}"));
        let caller = Arc::new(caller);
        let request = UpstreamRequest::get("posts", caller.endpoint("posts"));
        let task = tokio::spawn({
            let caller = Arc::clone(&caller);
            async move {
                let ctx = CallContext::background();
                caller.call::<serde_json::Value>(&ctx, &request).await
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(sink.count(MessageCode::ExternalCallStart), 1);
        assert_eq!(sink.count(MessageCode::ExternalCallCanceled), 1);
        let events = sink.events();
        assert!(events[1].message.contains("call dropped before completion"));
    }
}
