use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::resilience::circuit_breaker::{CircuitSnapshot, CircuitState};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub verified_tokens: usize,
    pub tracked_circuits: usize,
    pub open_circuits: usize,
    pub half_open_circuits: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let circuits = state.breaker.snapshot();
    let count = |wanted: CircuitState| circuits.iter().filter(|c| c.state == wanted).count();
    let open_circuits = count(CircuitState::Open);
    let half_open_circuits = count(CircuitState::HalfOpen);

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if open_circuits + half_open_circuits == 0 {
            "operational"
        } else {
            "degraded"
        },
        uptime_secs: state.started_at.elapsed().as_secs(),
        verified_tokens: state.gate.verified_count(),
        tracked_circuits: circuits.len(),
        open_circuits,
        half_open_circuits,
    })
}

pub async fn get_circuits(State(state): State<AdminState>) -> Json<Vec<CircuitSnapshot>> {
    Json(state.breaker.snapshot())
}

pub async fn reset_circuit(
    State(state): State<AdminState>,
    Path(key): Path<String>,
) -> StatusCode {
    if state.breaker.reset(&key) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
