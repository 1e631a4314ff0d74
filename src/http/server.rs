//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the outbound stack (caller, aggregator, posts service)
//! - Create the Axum router with all handlers
//! - Wire up middleware (correlation, panic recovery, tracing, request timeout)
//! - Serve on a bound listener until shutdown is signaled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::http::middleware::correlation_middleware;
use crate::http::response::panic_response;
use crate::observability::{EventSink, TracingSink};
use crate::posts::PostsService;
use crate::upstream::{BoundedCaller, FanOutAggregator, SetupError};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<PostsService>,
    pub sink: Arc<dyn EventSink>,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a server that logs through `tracing`.
    pub fn new(config: ServiceConfig) -> Result<Self, SetupError> {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create a server that logs request and call events to `sink`.
    pub fn with_sink(config: ServiceConfig, sink: Arc<dyn EventSink>) -> Result<Self, SetupError> {
        let state = Self::build_state(&config, sink)?;
        let routes = Router::new()
            .route("/external", get(handlers::all_posts))
            .route("/external/users/{user_id}", get(handlers::user_with_posts))
            .route("/health", get(handlers::health));
        let router = Self::build_router(routes, &config, state);
        Ok(Self { router, config })
    }

    fn build_state(
        config: &ServiceConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<AppState, SetupError> {
        let caller = BoundedCaller::new(&config.upstream, Arc::clone(&sink))?;
        tracing::info!(
            base_url = %caller.base_url(),
            call_timeout_ms = caller.timeout().as_millis() as u64,
            "Upstream caller ready"
        );
        let posts = Arc::new(PostsService::new(FanOutAggregator::new(Arc::new(caller))));
        Ok(AppState { posts, sink })
    }

    /// Wrap `routes` in all middleware layers.
    ///
    /// Panics are caught inside the correlation middleware so the request
    /// still gets its end event and correlation header.
    #[allow(deprecated)]
    fn build_router(routes: Router<AppState>, config: &ServiceConfig, state: AppState) -> Router {
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        routes
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn_with_state(state.clone(), correlation_middleware))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
