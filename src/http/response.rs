//! Response envelopes and error mapping.
//!
//! # Responsibilities
//! - Wrap successful payloads as `{"data": ...}`
//! - Map failures to a status code and `{"error": "<message code>"}`
//! - Turn a caught handler panic into `500 {"error": "E001-00004"}`
//!
//! # Design Decisions
//! - Upstream unreachable (connection, timeout, cancel) → 503
//! - Upstream rejected the request or sent an unusable body → 502
//! - Internal details stay in logs; the body only carries the code

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::observability::MessageCode;
use crate::upstream::{ErrorClass, ExternalApiError};

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Failure of a handler.
#[derive(Debug)]
pub enum ApiError {
    External(ExternalApiError),
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::External(err) => status_for(err.class()),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> MessageCode {
        match self {
            ApiError::External(err) => err.code(),
            ApiError::BadRequest(_) => MessageCode::BadRequest,
        }
    }
}

impl From<ExternalApiError> for ApiError {
    fn from(err: ExternalApiError) -> Self {
        ApiError::External(err)
    }
}

pub fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorClass::Rejected => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.code().as_str() });
        (self.status(), Json(body)).into_response()
    }
}

/// Panic message carried on a response built by [`panic_response`], so the
/// correlation middleware can log it against the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicDetails(pub String);

/// Response for a handler panic caught by `CatchPanicLayer`.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "panic payload is not a string".to_string()
    };

    let body = json!({ "error": MessageCode::PanicThrown.as_str() });
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
    response.extensions_mut().insert(PanicDetails(detail));
    response
}
