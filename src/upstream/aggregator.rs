//! Fan-out aggregator.
//!
//! # Responsibilities
//! - Run a sequence of calls concurrently under one shared cancel scope
//! - On the first failure, cancel the siblings and surface that failure
//! - Otherwise return every result in input order
//!
//! # Design Decisions
//! - One call runs inline on the caller's context; the semantics match the
//!   concurrent path because both go through the same call function
//! - Tasks left running after a failure are awaited and their outcomes
//!   discarded, so no task outlives `aggregate`
//! - A panic inside a call propagates to the caller after siblings are
//!   canceled and drained
//! - Dropping `aggregate` mid-flight (client gone, inbound timeout) cancels
//!   the scope before the tasks are aborted, so each call still logs a
//!   canceled end event

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use tokio::task::JoinSet;

use crate::context::{CallContext, CancelCause, Canceller};
use crate::observability::{EventSink, MessageCode};
use crate::upstream::caller::BoundedCaller;
use crate::upstream::error::ExternalApiError;
use crate::upstream::outcome::CallOutcome;
use crate::upstream::request::UpstreamRequest;

type CallFuture<T> = BoxFuture<'static, CallOutcome<T>>;
type CallFn<T> =
    Box<dyn FnOnce(Arc<BoundedCaller>, CallContext, UpstreamRequest) -> CallFuture<T> + Send>;

/// One entry of a fan-out: the request plus how its result is produced.
///
/// `T` is the combined payload type; each call wraps its own decoded shape
/// into it.
pub struct CallSpec<T> {
    request: UpstreamRequest,
    run: CallFn<T>,
}

impl<T: Send + 'static> CallSpec<T> {
    /// A call through the bounded caller, decoded as `U` and wrapped.
    pub fn json<U>(request: UpstreamRequest, wrap: fn(U) -> T) -> Self
    where
        U: DeserializeOwned + Send + 'static,
    {
        Self {
            request,
            run: Box::new(move |caller, ctx, request| {
                Box::pin(async move { caller.call::<U>(&ctx, &request).await.map(wrap) })
            }),
        }
    }

    /// A call resolved by `f` instead of the bounded caller.
    pub fn from_fn<F, Fut>(request: UpstreamRequest, f: F) -> Self
    where
        F: FnOnce(CallContext) -> Fut + Send + 'static,
        Fut: Future<Output = CallOutcome<T>> + Send + 'static,
    {
        Self {
            request,
            run: Box::new(move |_, ctx, _| Box::pin(f(ctx))),
        }
    }

    pub fn request(&self) -> &UpstreamRequest {
        &self.request
    }
}

/// Runs call sequences with first-failure cancellation.
#[derive(Clone)]
pub struct FanOutAggregator {
    caller: Arc<BoundedCaller>,
    sink: Arc<dyn EventSink>,
}

impl FanOutAggregator {
    pub fn new(caller: Arc<BoundedCaller>) -> Self {
        let sink = Arc::clone(caller.sink());
        Self { caller, sink }
    }

    pub fn caller(&self) -> &BoundedCaller {
        &self.caller
    }

    /// Run `calls` and return their results in input order, or the first
    /// failure observed.
    pub async fn aggregate<T>(
        &self,
        ctx: &CallContext,
        calls: Vec<CallSpec<T>>,
    ) -> Result<Vec<T>, ExternalApiError>
    where
        T: Send + 'static,
    {
        if calls.len() > 1 {
            return self.fan_out(ctx, calls).await;
        }

        let mut results = Vec::with_capacity(calls.len());
        for CallSpec { request, run } in calls {
            let endpoint = request.to_string();
            let outcome = run(Arc::clone(&self.caller), ctx.clone(), request).await;
            results.push(self.settle(ctx, endpoint, outcome)?);
        }
        Ok(results)
    }

    async fn fan_out<T>(
        &self,
        ctx: &CallContext,
        calls: Vec<CallSpec<T>>,
    ) -> Result<Vec<T>, ExternalApiError>
    where
        T: Send + 'static,
    {
        let total = calls.len();
        let (scope, canceller) = ctx.with_cancel();
        // Declared after `tasks` so it drops first.
        let mut tasks = JoinSet::new();
        let scope_guard = ScopeGuard(canceller);
        let canceller = &scope_guard.0;

        for (index, CallSpec { request, run }) in calls.into_iter().enumerate() {
            let caller = Arc::clone(&self.caller);
            let scope = scope.clone();
            tasks.spawn(async move {
                let endpoint = request.to_string();
                let outcome = run(caller, scope, request).await;
                (index, endpoint, outcome)
            });
        }

        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();

        while let Some(joined) = tasks.join_next().await {
            let (endpoint, failure) = match joined {
                Ok((index, _, CallOutcome::Success(value))) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(value);
                    }
                    continue;
                }
                Ok((_, endpoint, failure)) => (endpoint, failure),
                Err(error) if error.is_panic() => {
                    canceller.cancel(CancelCause::Requested("sibling call panicked".to_string()));
                    drain(&mut tasks).await;
                    std::panic::resume_unwind(error.into_panic());
                }
                Err(error) => (
                    "unknown".to_string(),
                    CallOutcome::Canceled {
                        cause: error.to_string(),
                    },
                ),
            };

            let remaining = tasks.len();
            let cause = CancelCause::SiblingFailed {
                sibling: endpoint.clone(),
            };
            if canceller.cancel(cause) && remaining > 0 {
                self.sink.emit(
                    MessageCode::ExternalCallCanceled,
                    ctx.correlation(),
                    &format!("Canceling {remaining} in-flight call(s) after failure of {endpoint}"),
                );
            }
            drain(&mut tasks).await;
            return self.settle(ctx, endpoint, failure).map(|_| Vec::new());
        }

        Ok(slots.into_iter().flatten().collect())
    }

    fn settle<T>(
        &self,
        ctx: &CallContext,
        endpoint: String,
        outcome: CallOutcome<T>,
    ) -> Result<T, ExternalApiError> {
        outcome.into_result(endpoint).inspect_err(|error| {
            self.sink.emit(error.code(), ctx.correlation(), &error.to_string());
        })
    }
}

impl std::fmt::Debug for FanOutAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutAggregator")
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

/// Cancels a fan-out scope when the fan-out is dropped.
///
/// A no-op once the fan-out has settled: every task has been joined by then.
struct ScopeGuard(Canceller);

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.0.cancel(CancelCause::Requested("fan-out abandoned".to_string()));
    }
}

async fn drain<R: 'static>(tasks: &mut JoinSet<R>) {
    while tasks.join_next().await.is_some() {}
}
