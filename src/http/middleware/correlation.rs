//! Request correlation middleware.
//!
//! # Responsibilities
//! - Resolve the client IP (forwarding headers first, then the peer address)
//! - Build one [`CorrelationContext`] per inbound request and attach it to
//!   the request extensions
//! - Log the request start and end events
//! - Log a caught handler panic against the request it broke
//! - Echo the correlation id in the `x-correlation-id` response header

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::context::{CorrelationContext, PLACEHOLDER};
use crate::http::response::PanicDetails;
use crate::http::server::AppState;
use crate::observability::{metrics, MessageCode};

pub const X_CORRELATION_ID: &str = "x-correlation-id";

pub async fn correlation_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = req.method().as_str().to_string();
    let ip = client_ip(&req);
    let correlation = CorrelationContext::for_request(&method, req.uri().path(), &ip);

    state
        .sink
        .emit(MessageCode::RequestStart, Some(&correlation), "Request start");
    req.extensions_mut().insert(correlation.clone());

    let mut response = next.run(req).await;
    let status = response.status().as_u16();

    if let Some(PanicDetails(detail)) = response.extensions_mut().remove::<PanicDetails>() {
        state.sink.emit(
            MessageCode::PanicThrown,
            Some(&correlation),
            &format!("Panic thrown: {detail}"),
        );
    }

    state.sink.emit(
        MessageCode::RequestEnd,
        Some(&correlation),
        &format!("Request end status code:{status}"),
    );
    if let Ok(value) = HeaderValue::from_str(&correlation.id().to_string()) {
        response.headers_mut().insert(X_CORRELATION_ID, value);
    }
    metrics::record_request(&method, status, started);
    response
}

/// Client IP of a request, or `N/A` when none can be determined.
pub fn client_ip<B>(req: &Request<B>) -> String {
    let headers = req.headers();
    forwarded_for(headers)
        .or_else(|| header_value(headers, "x-real-ip"))
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")?
        .split(',')
        .map(str::trim)
        .find(|hop| !hop.is_empty())
        .map(str::to_string)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
