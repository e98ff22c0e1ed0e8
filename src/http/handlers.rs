//! Route handlers.
//!
//! Protected handlers run after the access gate. Each upstream call goes
//! through the circuit breaker under a deadline, and breaker outcomes are
//! translated into degraded-service responses here.

use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreakerError;
use crate::resilience::timeouts::with_deadline;
use crate::upstream::{
    relay_rejections, ClientRejection, InferenceRequest, SearchResponse, UpstreamError,
};

/// Circuit key for the search provider.
pub const SEARCH_CIRCUIT: &str = "search";

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Response {
    let start = Instant::now();
    let query = params.q.trim();
    if query.is_empty() {
        metrics::record_request("search", 400, start);
        return error_response(StatusCode::BAD_REQUEST, "Missing query.");
    }

    tracing::debug!(request_id = %request_id(&headers), query = %query, "Searching");

    let deadline = state.upstream_timeout;
    let provider = &state.search;
    let result = state
        .breaker
        .execute(SEARCH_CIRCUIT, move || async move {
            relay_rejections(with_deadline(deadline, provider.search(query)).await)
        })
        .await;

    let response = match result {
        Ok(Ok(results)) => Json(SearchResponse {
            query: query.to_string(),
            results,
        })
        .into_response(),
        Ok(Err(rejection)) => relay_rejection(rejection, &headers),
        Err(e) => breaker_failure(e, &headers),
    };
    metrics::record_request("search", response.status().as_u16(), start);
    response
}

pub async fn inference(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut request): Json<InferenceRequest>,
) -> Response {
    let start = Instant::now();
    let model = request.model.trim().to_string();
    if model.is_empty() {
        metrics::record_request("inference", 400, start);
        return error_response(StatusCode::BAD_REQUEST, "Missing model.");
    }
    // Model names are circuit keys; restrict them when a list is configured.
    if !state.models.is_empty() && !state.models.contains(&model) {
        tracing::debug!(request_id = %request_id(&headers), model = %model, "Unknown model");
        metrics::record_request("inference", 400, start);
        return error_response(StatusCode::BAD_REQUEST, "Unknown model.");
    }
    request.model = model.clone();

    tracing::debug!(request_id = %request_id(&headers), model = %model, "Running inference");

    let deadline = state.upstream_timeout;
    let backend = &state.inference;
    let request = &request;
    let result = state
        .breaker
        .execute(&model, move || async move {
            relay_rejections(with_deadline(deadline, backend.complete(request)).await)
        })
        .await;

    let response = match result {
        Ok(Ok(body)) => Json(body).into_response(),
        Ok(Err(rejection)) => relay_rejection(rejection, &headers),
        Err(e) => breaker_failure(e, &headers),
    };
    metrics::record_request("inference", response.status().as_u16(), start);
    response
}

/// Map a breaker outcome to the client-facing response.
fn breaker_failure(err: CircuitBreakerError<UpstreamError>, headers: &HeaderMap) -> Response {
    let request_id = request_id(headers);
    match err {
        CircuitBreakerError::Open { key, retry_after } => {
            let secs = ((retry_after.as_millis() + 999) / 1000).max(1);
            tracing::warn!(request_id = %request_id, key = %key, "Upstream circuit open");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, secs.to_string())],
                Json(json!({ "error": "Service temporarily unavailable." })),
            )
                .into_response()
        }
        CircuitBreakerError::Inner(UpstreamError::Timeout(_)) => {
            tracing::warn!(request_id = %request_id, "Upstream timed out");
            error_response(StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out.")
        }
        CircuitBreakerError::Inner(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            error_response(StatusCode::BAD_GATEWAY, "Upstream request failed.")
        }
    }
}

/// Hand a client-caused upstream 4xx back to the caller.
fn relay_rejection(rejection: ClientRejection, headers: &HeaderMap) -> Response {
    tracing::debug!(
        request_id = %request_id(headers),
        status = rejection.status,
        "Upstream rejected request"
    );
    let status = StatusCode::from_u16(rejection.status).unwrap_or(StatusCode::BAD_REQUEST);
    match serde_json::from_str::<serde_json::Value>(&rejection.body) {
        Ok(body) => (status, Json(body)).into_response(),
        Err(_) => error_response(status, "Upstream rejected the request."),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
