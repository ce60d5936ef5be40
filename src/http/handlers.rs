//! Endpoint handlers.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::error::ProxyError;
use crate::http::response::{self, error_response};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::queue::Payload;
use crate::status::{RequestStatus, StatusRecord};

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub circuit: &'static str,
}

/// `GET /proxy`: call the upstream and wait for the result.
pub async fn sync_proxy(State(state): State<AppState>) -> Response {
    let start = Instant::now();

    let response = match state.client.get(&state.target).await {
        Ok(body) => {
            tracing::info!(bytes = body.len(), "Request handled successfully");
            (StatusCode::OK, Json(json!({ "data": body }))).into_response()
        }
        Err(e) => response::proxy_error(&e),
    };

    metrics::record_request("proxy", response.status().as_u16(), start);
    response
}

/// `POST /async-proxy`: record the request as queued, enqueue it and return its id.
pub async fn async_proxy(State(state): State<AppState>, body: Bytes) -> Response {
    let start = Instant::now();
    let response = submit(&state, &body).await;
    metrics::record_request("async_proxy", response.status().as_u16(), start);
    response
}

async fn submit(state: &AppState, body: &[u8]) -> Response {
    let request_id = state.ids.next_id();
    let data = Payload::from_bytes(body);

    if let Err(e) = state.statuses.create(StatusRecord::queued(&request_id)).await {
        tracing::error!(request_id = %request_id, error = %e, "Failed to save request status");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, response::STATUS_SAVE_FAILED);
    }

    if let Err(e) = state.queue.enqueue(&request_id, &data).await {
        tracing::error!(request_id = %request_id, error = %e, "Failed to enqueue request");
        // Nothing will ever consume it; don't leave the record looking queued.
        if let Err(e) = state.statuses.update_status(&request_id, RequestStatus::Failed).await {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to mark unqueued request failed");
        }
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, response::ENQUEUE_FAILED);
    }

    tracing::info!(request_id = %request_id, "Request queued");
    (StatusCode::OK, Json(json!({ "request_id": request_id }))).into_response()
}

/// `GET /requests/{id}`: current status record.
pub async fn request_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.statuses.get_by_id(&id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(ProxyError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, response::REQUEST_NOT_FOUND)
        }
        Err(e) => {
            tracing::error!(request_id = %id, error = %e, "Failed to load request status");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, response::STATUS_LOAD_FAILED)
        }
    }
}

/// `GET /health`: liveness plus the breaker state.
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        circuit: state.client.circuit_state().as_str(),
    })
}
