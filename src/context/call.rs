//! Cancellable, deadline-aware execution context for outbound calls.
//!
//! A [`CallContext`] is cheap to clone and is handed to every task spawned
//! while serving one inbound request. It carries:
//! - the request's [`CorrelationContext`] (read-only, attached at most once)
//! - an optional deadline, only ever tightened by derived contexts
//! - the cancellation signals of itself and every ancestor
//!
//! Cancellation is cooperative: code holding a context awaits
//! [`CallContext::done`] alongside its own work and returns once it fires.

use std::future::{pending, Future};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::select_all;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::context::correlation::CorrelationContext;

/// Why a context was canceled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelCause {
    /// A sibling call in the same fan-out failed.
    SiblingFailed { sibling: String },
    /// The owner of the scope canceled it for another reason.
    Requested(String),
}

impl std::fmt::Display for CancelCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelCause::SiblingFailed { sibling } => write!(f, "sibling call failed: {sibling}"),
            CancelCause::Requested(reason) => write!(f, "canceled: {reason}"),
        }
    }
}

/// Reason a context is no longer live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoneReason {
    DeadlineExceeded,
    Canceled(CancelCause),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("correlation context already attached (id {0})")]
    CorrelationAlreadyAttached(String),
}

type Signal = watch::Receiver<Option<CancelCause>>;

/// Execution context threaded explicitly through outbound calls.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    correlation: Option<Arc<CorrelationContext>>,
    deadline: Option<Instant>,
    signals: Vec<Signal>,
}

impl CallContext {
    /// A root context outside any request scope: no correlation, no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A root context for one inbound request.
    pub fn for_request(correlation: CorrelationContext) -> Self {
        Self {
            correlation: Some(Arc::new(correlation)),
            ..Self::default()
        }
    }

    /// Derive a child carrying `correlation`.
    ///
    /// Fails if the parent already carries one; a correlation id is never
    /// replaced mid-flight.
    pub fn attach(&self, correlation: CorrelationContext) -> Result<Self, ContextError> {
        if let Some(existing) = &self.correlation {
            return Err(ContextError::CorrelationAlreadyAttached(existing.id().to_string()));
        }
        Ok(Self {
            correlation: Some(Arc::new(correlation)),
            ..self.clone()
        })
    }

    /// The correlation metadata, or `None` outside a request scope.
    pub fn correlation(&self) -> Option<&CorrelationContext> {
        self.correlation.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derive a child whose deadline is at most `timeout` from now.
    ///
    /// An earlier inherited deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing <= candidate => existing,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// Derive a child that can be canceled through the returned handle.
    ///
    /// Canceling the child never affects the parent; canceling any ancestor
    /// is observed by the child.
    pub fn with_cancel(&self) -> (Self, Canceller) {
        let (tx, rx) = watch::channel(None);
        let mut child = self.clone();
        child.signals.push(rx);
        (child, Canceller { tx })
    }

    /// The first cancellation cause set on this context or an ancestor.
    pub fn cancel_cause(&self) -> Option<CancelCause> {
        self.signals.iter().find_map(|rx| rx.borrow().clone())
    }

    /// Non-blocking check: `Some` if the context is already done.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn is_done(&self) -> Option<DoneReason> {
        if let Some(cause) = self.cancel_cause() {
            return Some(DoneReason::Canceled(cause));
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(DoneReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the deadline passes or any cancellation signal fires.
    ///
    /// Never resolves for a background context.
    pub fn done(&self) -> impl Future<Output = DoneReason> + Send + 'static {
        let deadline = self.deadline;
        let signals = self.signals.clone();
        async move {
            let expired = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => pending::<()>().await,
                }
            };
            tokio::select! {
                biased;
                cause = any_canceled(signals) => DoneReason::Canceled(cause),
                () = expired => DoneReason::DeadlineExceeded,
            }
        }
    }
}

async fn any_canceled(signals: Vec<Signal>) -> CancelCause {
    if signals.is_empty() {
        return pending().await;
    }
    let waits = signals.into_iter().map(|rx| Box::pin(canceled(rx)));
    let (cause, _, _) = select_all(waits).await;
    cause
}

async fn canceled(mut rx: Signal) -> CancelCause {
    let cause = match rx.wait_for(Option::is_some).await {
        Ok(value) => value.clone(),
        Err(_) => None,
    };
    match cause {
        Some(cause) => cause,
        // Sender dropped without canceling: this scope can no longer be canceled.
        None => pending().await,
    }
}

/// Handle that cancels the context returned alongside it by
/// [`CallContext::with_cancel`].
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<Option<CancelCause>>,
}

impl Canceller {
    /// Cancel the scope. Only the first cause is kept.
    ///
    /// Returns `true` if this call performed the cancellation.
    pub fn cancel(&self, cause: CancelCause) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(cause);
            true
        })
    }

    pub fn is_canceled(&self) -> bool {
        self.tx.borrow().is_some()
    }
}
