//! Response mapping.
//!
//! # Responsibilities
//! - Map pipeline errors to status codes and JSON bodies
//! - Keep the error bodies stable: callers match on the message
//!
//! # Design Decisions
//! - Classification uses `ProxyError::root()`, so retry exhaustion never
//!   hides a rate limit or a bad upstream status
//! - Unexpected upstream status is a 502; circuit open and transport
//!   failures are 500

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::ProxyError;

pub const RATE_LIMIT_EXCEEDED: &str = "Rate limit exceeded";
pub const UNEXPECTED_STATUS: &str = "Unexpected status code";
pub const INTERNAL_ERROR: &str = "Internal server error";
pub const STATUS_SAVE_FAILED: &str = "Failed to save request status to db";
pub const ENQUEUE_FAILED: &str = "Failed to enqueue request";
pub const REQUEST_NOT_FOUND: &str = "Request not found";
pub const STATUS_LOAD_FAILED: &str = "Failed to load request status";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

pub fn error_response(status: StatusCode, message: &'static str) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

/// Response for a failed synchronous upstream call.
pub fn proxy_error(err: &ProxyError) -> Response {
    match err.root() {
        ProxyError::RateLimited => {
            tracing::warn!(error = %err, "Rate limit exceeded");
            error_response(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_EXCEEDED)
        }
        ProxyError::UnexpectedStatus(_) => {
            tracing::error!(error = %err, "Unexpected status code");
            error_response(StatusCode::BAD_GATEWAY, UNEXPECTED_STATUS)
        }
        _ => {
            tracing::error!(error = %err, kind = err.kind(), "Internal server error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}
