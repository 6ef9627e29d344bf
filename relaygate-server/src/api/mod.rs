//! API Routes
//!
//! Unified chat and conversation-history endpoints on `/v1/*`, resilience
//! introspection on `/api/*`, plus liveness and metrics.

mod chat;
mod error;
mod resilience;
mod sessions;

#[cfg(test)]
mod tests;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use relaygate_types::models::ANONYMOUS_CALLER;

use crate::state::AppState;

const CALLER_HEADER: &str = "x-caller-id";

/// Caller identity from the `x-caller-id` header, if present and non-empty.
fn caller_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn caller_or_anonymous(headers: &HeaderMap) -> String {
    caller_from_headers(headers).unwrap_or_else(|| ANONYMOUS_CALLER.to_string())
}

pub fn router() -> Router<AppState> {
    Router::new()
        // Chat
        .route("/v1/chat", post(chat::chat))
        // Agents and conversation history
        .route("/v1/agents", get(list_agents))
        .route("/v1/agents/:agent_id/init", get(sessions::initialize))
        .route("/v1/agents/:agent_id/conversations", get(sessions::list_conversations))
        .route(
            "/v1/agents/:agent_id/conversations/:conversation_id",
            get(sessions::get_conversation).delete(sessions::delete_conversation),
        )
        .route(
            "/v1/agents/:agent_id/conversations/:conversation_id/messages/:message_id/feedback",
            post(sessions::submit_feedback),
        )
        // Resilience
        .route("/api/resilience/circuits", get(resilience::get_circuit_status))
        .route("/api/status", get(get_status))
        // Liveness and metrics
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/metrics", get(resilience::get_metrics))
        .fallback(api_not_found)
}

/// Full application with middleware applied.
pub fn app(state: AppState) -> Router {
    router().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
    )
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

#[derive(Serialize)]
struct AgentListResponse {
    agents: Vec<String>,
}

async fn list_agents(State(state): State<AppState>) -> Json<AgentListResponse> {
    Json(AgentListResponse { agents: state.agent_ids().await })
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    providers: Vec<String>,
    cached_session_entries: usize,
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        providers: state.registry().kinds().iter().map(ToString::to_string).collect(),
        cached_session_entries: state.sessions().cached_entries(),
    })
}
