use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};

use relaygate_types::protocol::FeedbackRequest;
use relaygate_types::{
    AppInitInfo, ConversationDetail, ConversationPage, ConversationQuery, FeedbackSubmission,
    ProxyError,
};

use super::caller_or_anonymous;
use super::error::ApiError;
use crate::state::AppState;

pub async fn initialize(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AppInitInfo>, ApiError> {
    let agent = state.agent(&agent_id).await?;
    let info = state.sessions().initialize(&agent, &caller_or_anonymous(&headers)).await?;
    Ok(Json(info))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<ConversationQuery>,
    headers: HeaderMap,
) -> Result<Json<ConversationPage>, ApiError> {
    if query.limit == 0 {
        return Err(ProxyError::config("limit must be at least 1").into());
    }
    let agent = state.agent(&agent_id).await?;
    let page = state.sessions().list_conversations(&agent, &caller_or_anonymous(&headers), &query).await?;
    Ok(Json(page))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path((agent_id, conversation_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<ConversationDetail>, ApiError> {
    let agent = state.agent(&agent_id).await?;
    let detail =
        state.sessions().get_conversation(&agent, &caller_or_anonymous(&headers), &conversation_id).await?;
    Ok(Json(detail))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Path((agent_id, conversation_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let agent = state.agent(&agent_id).await?;
    state.sessions().delete_conversation(&agent, &caller_or_anonymous(&headers), &conversation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Path((agent_id, conversation_id, message_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(request): Json<FeedbackRequest>,
) -> Result<StatusCode, ApiError> {
    let agent = state.agent(&agent_id).await?;
    let feedback = FeedbackSubmission { conversation_id, message_id, rating: request.rating, comment: request.comment };
    state.sessions().submit_feedback(&agent, &caller_or_anonymous(&headers), &feedback).await?;
    Ok(StatusCode::NO_CONTENT)
}
