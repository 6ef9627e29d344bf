use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use relaygate_core::proxy::prometheus;
use relaygate_core::proxy::{CircuitBreakerSummary, CircuitSnapshot};

use crate::state::AppState;

#[derive(Serialize)]
pub struct CircuitStatusResponse {
    pub summary: CircuitBreakerSummary,
    pub circuits: Vec<CircuitSnapshot>,
    pub tracked_rate_limit_buckets: usize,
}

pub async fn get_circuit_status(State(state): State<AppState>) -> Json<CircuitStatusResponse> {
    let reliability = state.reliability();
    let mut circuits = reliability.snapshots();
    circuits.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));

    Json(CircuitStatusResponse {
        summary: reliability.circuit_summary(),
        circuits,
        tracked_rate_limit_buckets: reliability.limiter().tracked_buckets(),
    })
}

pub async fn get_metrics() -> Response {
    let metrics = prometheus::render_metrics();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], metrics).into_response()
}
