//! Workflow-style assistant platform.
//!
//! OpenAI-shaped completions at `{endpoint}/v1/chat/completions`, extended with
//! `chatId` / `variables` / `detail`. The caller owns continuation: when a
//! `chatId` is supplied the platform already holds the history, so only the
//! newest user turn is sent. A fresh `chatId` is generated otherwise and
//! echoed back as the session id.

mod models;
mod session;

#[cfg(test)]
mod tests;

use reqwest::header::HeaderMap;
use regex::Regex;
use relaygate_types::models::{AppInitInfo, ConversationDetail, ConversationPage, ConversationQuery};
use relaygate_types::{
    AgentConfig, ChatMessage, ChatOptions, FeedbackSubmission, FileKind, FileRef, ProviderKind,
    ProxyError, ProxyResult, StreamEvent, UnifiedChatResponse,
};
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

use super::common::{
    bearer_headers, check_attachments, collect_attachments, content_text, last_user_message,
    openai_usage, require_credential, ProviderRequest, StreamChunk,
};
use super::ProviderAdapter;
use crate::proxy::upstream::client::build_url;
use models::{CompletionResponse, WorkflowChunk};

pub(crate) const PROVIDER: &str = "workflow-platform";

/// Application ids are 24 lowercase hex characters.
static APP_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{24}$").ok());

pub fn is_valid_app_id(app_id: &str) -> bool {
    APP_ID_PATTERN.as_ref().is_some_and(|re| re.is_match(app_id))
}

fn new_chat_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowAdapter;

impl WorkflowAdapter {
    fn app_id(agent: &AgentConfig) -> ProxyResult<&str> {
        let app_id = agent.app_id.as_deref().ok_or_else(|| {
            ProxyError::config(format!("agent {} requires an upstream app id", agent.id))
        })?;
        if !is_valid_app_id(app_id) {
            return Err(ProxyError::config(format!(
                "agent {} app id {app_id:?} is not 24 lowercase hex characters",
                agent.id
            )));
        }
        Ok(app_id)
    }

    fn message_json(message: &ChatMessage, files: &[&FileRef]) -> Value {
        if files.is_empty() {
            return json!({"role": message.role.as_str(), "content": message.content});
        }

        let mut parts = vec![json!({"type": "text", "text": message.content})];
        for file in files {
            parts.push(match file.kind {
                FileKind::Image => json!({"type": "image_url", "image_url": {"url": file.url}}),
                FileKind::Document => json!({
                    "type": "file_url",
                    "name": file.name.clone().unwrap_or_else(|| file.url.clone()),
                    "url": file.url,
                }),
            });
        }
        json!({"role": message.role.as_str(), "content": parts})
    }
}

impl ProviderAdapter for WorkflowAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::WorkflowPlatform
    }

    fn check_config(&self, agent: &AgentConfig) -> ProxyResult<()> {
        require_credential(agent)?;
        Self::app_id(agent).map(|_| ())
    }

    fn build_headers(&self, agent: &AgentConfig) -> ProxyResult<HeaderMap> {
        bearer_headers(&agent.credential)
    }

    fn transform_request(
        &self,
        messages: &[ChatMessage],
        agent: &AgentConfig,
        streaming: bool,
        options: &ChatOptions,
    ) -> ProxyResult<ProviderRequest> {
        let app_id = Self::app_id(agent)?;
        let last_user = last_user_message(messages)?;
        let files = collect_attachments(last_user, &options.files);
        check_attachments(agent, &files)?;

        let (chat_id, history): (String, Vec<&ChatMessage>) = match &options.session_id {
            Some(chat_id) => (chat_id.clone(), vec![last_user]),
            None => (new_chat_id(), messages.iter().collect()),
        };

        let wire_messages: Vec<Value> = history
            .into_iter()
            .map(|message| {
                if std::ptr::eq(message, last_user) {
                    Self::message_json(message, &files)
                } else {
                    Self::message_json(message, &[])
                }
            })
            .collect();

        let mut body = Map::new();
        body.insert("appId".to_string(), json!(app_id));
        body.insert("chatId".to_string(), json!(chat_id));
        body.insert("stream".to_string(), json!(streaming));
        body.insert("detail".to_string(), json!(options.detail && agent.capabilities.supports_detail));
        body.insert("variables".to_string(), json!(options.variables));
        body.insert("messages".to_string(), Value::Array(wire_messages));
        if let Some(user) = options.user.as_deref().filter(|u| !u.is_empty()) {
            body.insert("customUid".to_string(), json!(user));
        }

        Ok(ProviderRequest::post(build_url(agent.base_url(), "v1/chat/completions"), Value::Object(body))
            .with_session(chat_id))
    }

    fn transform_response(&self, body: Value) -> ProxyResult<UnifiedChatResponse> {
        let usage = body.get("usage").and_then(openai_usage);
        let parsed: CompletionResponse = serde_json::from_value(body)
            .map_err(|e| ProxyError::invalid_response(PROVIDER, e.to_string()))?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProxyError::invalid_response(PROVIDER, "response has no choices"))?
            .message;

        Ok(UnifiedChatResponse {
            content: content_text(&message.content),
            reasoning: message.reasoning_content.filter(|r| !r.is_empty()),
            usage,
            session_id: None,
        })
    }

    fn transform_stream_response(&self, chunk: &StreamChunk) -> ProxyResult<Option<StreamEvent>> {
        let event = match WorkflowChunk::decode(chunk)? {
            WorkflowChunk::Done => Some(StreamEvent::Done),
            WorkflowChunk::Answer(completion) => {
                let delta = completion.choices.into_iter().next().map(|c| c.delta).unwrap_or_default();
                match (delta.content, delta.reasoning_content) {
                    (Some(text), _) if !text.is_empty() => Some(StreamEvent::answer(text)),
                    (_, Some(reasoning)) if !reasoning.is_empty() => Some(StreamEvent::reasoning(reasoning)),
                    _ => None,
                }
            },
            WorkflowChunk::NodeStatus(status) => Some(StreamEvent::Status {
                status: status.status,
                name: status.name,
                detail: Value::Null,
            }),
            WorkflowChunk::Interactive(payload) => Some(StreamEvent::Interactive { payload }),
            WorkflowChunk::FlowResponses(payload) => Some(StreamEvent::Status {
                status: "flow-responses".to_string(),
                name: None,
                detail: payload,
            }),
            WorkflowChunk::Progress { event, payload } => {
                Some(StreamEvent::Status { status: event, name: None, detail: payload })
            },
            WorkflowChunk::Error(payload) => {
                let message = payload
                    .get("message")
                    .and_then(Value::as_str)
                    .or_else(|| payload.as_str())
                    .unwrap_or("upstream reported an error")
                    .to_string();
                Some(StreamEvent::error("provider_stream_error", message))
            },
            WorkflowChunk::Other(_) => None,
        };
        Ok(event)
    }

    fn stream_reasoning(&self, chunk: &StreamChunk) -> Option<String> {
        let WorkflowChunk::Answer(completion) = WorkflowChunk::decode(chunk).ok()? else {
            return None;
        };
        let delta = completion.choices.into_iter().next()?.delta;
        delta.content.filter(|t| !t.is_empty())?;
        delta.reasoning_content.filter(|r| !r.is_empty())
    }

    fn list_conversations_request(
        &self,
        agent: &AgentConfig,
        _caller_id: &str,
        query: &ConversationQuery,
    ) -> ProxyResult<ProviderRequest> {
        session::list_request(agent, Self::app_id(agent)?, query)
    }

    fn parse_conversation_list(
        &self,
        body: Value,
        query: &ConversationQuery,
    ) -> ProxyResult<ConversationPage> {
        session::parse_list(body, query)
    }

    fn get_conversation_request(
        &self,
        agent: &AgentConfig,
        _caller_id: &str,
        conversation_id: &str,
    ) -> ProxyResult<ProviderRequest> {
        Ok(session::records_request(agent, Self::app_id(agent)?, conversation_id))
    }

    fn parse_conversation(
        &self,
        conversation_id: &str,
        body: Value,
    ) -> ProxyResult<ConversationDetail> {
        session::parse_records(conversation_id, body)
    }

    fn delete_conversation_request(
        &self,
        agent: &AgentConfig,
        _caller_id: &str,
        conversation_id: &str,
    ) -> ProxyResult<ProviderRequest> {
        Ok(session::delete_request(agent, Self::app_id(agent)?, conversation_id))
    }

    fn feedback_request(
        &self,
        agent: &AgentConfig,
        _caller_id: &str,
        feedback: &FeedbackSubmission,
    ) -> ProxyResult<ProviderRequest> {
        Ok(session::feedback_request(agent, Self::app_id(agent)?, feedback))
    }

    fn init_request(&self, agent: &AgentConfig, _caller_id: &str) -> ProxyResult<ProviderRequest> {
        Ok(session::init_request(agent, Self::app_id(agent)?))
    }

    fn parse_init(&self, body: Value) -> ProxyResult<AppInitInfo> {
        session::parse_init(body)
    }

    fn check_ack(&self, body: &Value, resource: &str) -> ProxyResult<()> {
        session::unwrap_envelope(body.clone(), resource).map(|_| ())
    }
}
