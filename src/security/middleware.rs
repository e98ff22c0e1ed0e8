//! Access gate middleware.
//! Admits requests carrying a valid, in-quota token.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::access_gate::AuthorizationResult;
use crate::security::token::fingerprint;

/// Context attached to admitted requests.
#[derive(Clone, Debug)]
pub struct AccessContext {
    /// Log-safe token identifier.
    pub fingerprint: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Token from the `token` query parameter, else from `Authorization: Bearer`.
pub fn extract_token(req: &Request<Body>) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
        .or_else(|| extract_bearer_token(req.headers()).map(str::to_string))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub async fn access_gate_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Passthrough mode.
    if !state.gate_enabled {
        return next.run(req).await;
    }

    let token = extract_token(&req);
    match state.gate.verify_token_and_rate_limit(token.as_deref()).await {
        Ok(AuthorizationResult::Authorized) => {
            if let Some(token) = token {
                req.extensions_mut().insert(AccessContext {
                    fingerprint: fingerprint(&token),
                });
            }
            next.run(req).await
        }
        Ok(result @ AuthorizationResult::Rejected(rejection)) => {
            (rejection.status_code(), Json(result)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Access check failed");
            metrics::record_admission("error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Access check failed." })),
            )
                .into_response()
        }
    }
}
