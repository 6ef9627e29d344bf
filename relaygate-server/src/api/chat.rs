use axum::{
    extract::State,
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::StreamExt;
use std::convert::Infallible;
use tracing::debug;

use relaygate_core::ChatOutcome;
use relaygate_types::protocol::ChatRequest;
use relaygate_types::StreamEvent;

use super::error::ApiError;
use super::caller_from_headers;
use crate::state::AppState;

fn sse_event(event: &StreamEvent) -> Event {
    Event::default().event(event.event_name()).data(event.data().to_string())
}

/// `POST /v1/chat`: JSON for plain calls, `text/event-stream` when the
/// request asks to stream.
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let (agent_id, messages, mut options) = request.into_parts();
    if let Some(caller) = caller_from_headers(&headers) {
        options.user = Some(caller);
    }

    let agent = state.agent(&agent_id).await?;
    debug!("Chat for {} from {} (stream: {})", agent_id, options.caller_id(), options.stream);

    match state.chat().send(&agent, &messages, &options).await? {
        ChatOutcome::Complete(response) => Ok(Json(response).into_response()),
        ChatOutcome::Stream(events) => {
            let frames = events.map(|event| Ok::<_, Infallible>(sse_event(&event)));
            Ok(Sse::new(frames).keep_alive(KeepAlive::default()).into_response())
        },
    }
}
