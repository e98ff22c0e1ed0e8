//! Read-mostly admin API, served on its own listener.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::AppState;

#[derive(Clone)]
pub struct AdminState {
    pub api_key: Arc<str>,
    pub gate: Arc<crate::security::AccessGate>,
    pub breaker: Arc<crate::resilience::CircuitBreaker>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(api_key: &str, app: &AppState) -> Self {
        Self {
            api_key: Arc::from(api_key),
            gate: app.gate.clone(),
            breaker: app.breaker.clone(),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/circuits", get(get_circuits))
        .route("/admin/circuits/{key}/reset", post(reset_circuit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
