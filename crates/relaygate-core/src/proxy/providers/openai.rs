//! OpenAI-compatible chat completions.
//!
//! Stateless: the caller resends the full history, so no session operations.

use reqwest::header::HeaderMap;
use relaygate_types::{
    AgentConfig, ChatMessage, ChatOptions, ChatRole, FileKind, ProviderKind, ProxyError, ProxyResult,
    StreamEvent, UnifiedChatResponse,
};
use serde_json::{json, Map, Value};

use super::common::{
    bearer_headers, check_attachments, collect_attachments, content_text, invalid, openai_usage,
    require_credential, require_model, str_field, ProviderRequest, StreamChunk,
};
use super::ProviderAdapter;
use crate::proxy::upstream::client::build_url;

const PROVIDER: &str = "generic-chat-a";

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiAdapter;

impl OpenAiAdapter {
    fn message_json(
        agent: &AgentConfig,
        message: &ChatMessage,
        options: &ChatOptions,
        is_last_user: bool,
    ) -> ProxyResult<Value> {
        let files = if is_last_user {
            collect_attachments(message, &options.files)
        } else {
            message.attachments.iter().collect()
        };
        if files.is_empty() {
            return Ok(json!({"role": message.role.as_str(), "content": message.content}));
        }
        check_attachments(agent, &files)?;

        let mut parts = vec![json!({"type": "text", "text": message.content})];
        for file in files {
            match file.kind {
                FileKind::Image => parts.push(json!({"type": "image_url", "image_url": {"url": file.url}})),
                FileKind::Document => {
                    return Err(ProxyError::config(format!(
                        "{PROVIDER} agents accept image attachments only"
                    )))
                },
            }
        }
        Ok(json!({"role": message.role.as_str(), "content": parts}))
    }
}

impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiChat
    }

    fn check_config(&self, agent: &AgentConfig) -> ProxyResult<()> {
        require_credential(agent)?;
        require_model(agent).map(|_| ())
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
        let model = require_model(agent)?;
        if messages.is_empty() {
            return Err(ProxyError::config("conversation is empty"));
        }
        let last_user = messages.iter().rposition(|m| m.role == ChatRole::User);

        let wire_messages = messages
            .iter()
            .enumerate()
            .map(|(i, message)| Self::message_json(agent, message, options, Some(i) == last_user))
            .collect::<ProxyResult<Vec<_>>>()?;

        let mut body = Map::new();
        body.insert("model".to_string(), json!(model));
        body.insert("messages".to_string(), Value::Array(wire_messages));
        body.insert("stream".to_string(), json!(streaming));
        if streaming {
            body.insert("stream_options".to_string(), json!({"include_usage": true}));
        }
        if let Some(max_tokens) = agent.limits.max_tokens {
            body.insert("max_tokens".to_string(), json!(max_tokens));
        }
        if let Some(temperature) = agent.limits.temperature {
            body.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(user) = options.user.as_deref().filter(|u| !u.is_empty()) {
            body.insert("user".to_string(), json!(user));
        }

        Ok(ProviderRequest::post(build_url(agent.base_url(), "chat/completions"), Value::Object(body)))
    }

    fn transform_response(&self, body: Value) -> ProxyResult<UnifiedChatResponse> {
        let message = body
            .pointer("/choices/0/message")
            .ok_or_else(|| invalid(PROVIDER, "response has no choices"))?;
        let reasoning = str_field(message, "reasoning_content").filter(|r| !r.is_empty()).map(str::to_string);

        Ok(UnifiedChatResponse {
            content: message.get("content").map(content_text).unwrap_or_default(),
            reasoning,
            usage: body.get("usage").and_then(openai_usage),
            session_id: None,
        })
    }

    fn transform_stream_response(&self, chunk: &StreamChunk) -> ProxyResult<Option<StreamEvent>> {
        if chunk.is_done_marker() {
            return Ok(Some(StreamEvent::Done));
        }
        let payload = &chunk.payload;
        if !payload.is_object() {
            return Err(ProxyError::StreamParse { message: format!("{PROVIDER} chunk is not an object") });
        }

        if let Some(error) = payload.get("error") {
            let message = str_field(error, "message").unwrap_or("upstream reported an error");
            return Ok(Some(StreamEvent::error("provider_stream_error", message)));
        }

        if let Some(delta) = payload.pointer("/choices/0/delta") {
            if let Some(text) = str_field(delta, "content").filter(|t| !t.is_empty()) {
                return Ok(Some(StreamEvent::answer(text)));
            }
            if let Some(text) = str_field(delta, "reasoning_content").filter(|t| !t.is_empty()) {
                return Ok(Some(StreamEvent::reasoning(text)));
            }
        }

        // With include_usage the final chunk has empty choices and a usage block.
        Ok(payload.get("usage").and_then(openai_usage).map(|usage| StreamEvent::Usage { usage }))
    }

    fn stream_reasoning(&self, chunk: &StreamChunk) -> Option<String> {
        let delta = chunk.payload.pointer("/choices/0/delta")?;
        str_field(delta, "content").filter(|t| !t.is_empty())?;
        str_field(delta, "reasoning_content").filter(|t| !t.is_empty()).map(str::to_string)
    }
}
