//! Anthropic-style messages API.

use reqwest::header::{self, HeaderMap, HeaderValue};
use relaygate_types::{
    AgentConfig, ChatMessage, ChatOptions, ChatRole, FileKind, FileRef, ProviderKind, ProxyError,
    ProxyResult, StreamEvent, TokenUsage, UnifiedChatResponse,
};
use serde_json::{json, Map, Value};

use super::common::{
    check_attachments, clamp_u32, collect_attachments, header_value, invalid, require_credential,
    require_model, str_field, ProviderRequest, StreamChunk,
};
use super::ProviderAdapter;
use crate::proxy::upstream::client::build_url;

const PROVIDER: &str = "generic-chat-b";
const API_VERSION: &str = "2023-06-01";
/// `max_tokens` is mandatory upstream.
const DEFAULT_MAX_TOKENS: u32 = 4096;

fn usage_from(value: &Value) -> Option<TokenUsage> {
    let input = value.get("input_tokens").and_then(Value::as_u64);
    let output = value.get("output_tokens").and_then(Value::as_u64);
    if input.is_none() && output.is_none() {
        return None;
    }
    Some(TokenUsage::new(clamp_u32(input.unwrap_or(0)), clamp_u32(output.unwrap_or(0))))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicAdapter;

impl AnthropicAdapter {
    fn content_blocks(agent: &AgentConfig, message: &ChatMessage, extra: &[FileRef]) -> ProxyResult<Value> {
        let files = collect_attachments(message, extra);
        if files.is_empty() {
            return Ok(json!(message.content));
        }
        check_attachments(agent, &files)?;

        let mut blocks = Vec::with_capacity(files.len() + 1);
        for file in files {
            if file.kind == FileKind::Document {
                return Err(ProxyError::config(format!("{PROVIDER} agents accept image attachments only")));
            }
            blocks.push(json!({"type": "image", "source": {"type": "url", "url": file.url}}));
        }
        blocks.push(json!({"type": "text", "text": message.content}));
        Ok(Value::Array(blocks))
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AnthropicChat
    }

    fn check_config(&self, agent: &AgentConfig) -> ProxyResult<()> {
        require_credential(agent)?;
        require_model(agent).map(|_| ())
    }

    fn build_headers(&self, agent: &AgentConfig) -> ProxyResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", header_value(&agent.credential)?);
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn transform_request(
        &self,
        messages: &[ChatMessage],
        agent: &AgentConfig,
        streaming: bool,
        options: &ChatOptions,
    ) -> ProxyResult<ProviderRequest> {
        let model = require_model(agent)?;

        // System turns move to the top-level `system` field.
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();
        let turns: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != ChatRole::System).collect();
        if turns.is_empty() {
            return Err(ProxyError::config("conversation contains no user message"));
        }
        let last_user = turns.iter().rposition(|m| m.role == ChatRole::User);

        let mut wire_messages = Vec::with_capacity(turns.len());
        for (i, message) in turns.iter().enumerate() {
            let extra: &[FileRef] = if Some(i) == last_user { &options.files } else { &[] };
            wire_messages.push(json!({
                "role": message.role.as_str(),
                "content": Self::content_blocks(agent, message, extra)?,
            }));
        }

        let mut body = Map::new();
        body.insert("model".to_string(), json!(model));
        body.insert("max_tokens".to_string(), json!(agent.limits.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)));
        body.insert("messages".to_string(), Value::Array(wire_messages));
        body.insert("stream".to_string(), json!(streaming));
        if !system.is_empty() {
            body.insert("system".to_string(), json!(system.join("\n\n")));
        }
        if let Some(temperature) = agent.limits.temperature {
            body.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(user) = options.user.as_deref().filter(|u| !u.is_empty()) {
            body.insert("metadata".to_string(), json!({"user_id": user}));
        }

        Ok(ProviderRequest::post(build_url(agent.base_url(), "messages"), Value::Object(body)))
    }

    fn transform_response(&self, body: Value) -> ProxyResult<UnifiedChatResponse> {
        let blocks = body
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid(PROVIDER, "response has no content blocks"))?;

        let mut content = String::new();
        let mut reasoning = String::new();
        for block in blocks {
            match str_field(block, "type") {
                Some("text") => content.push_str(str_field(block, "text").unwrap_or_default()),
                Some("thinking") => reasoning.push_str(str_field(block, "thinking").unwrap_or_default()),
                _ => {},
            }
        }

        Ok(UnifiedChatResponse {
            content,
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
            usage: body.get("usage").and_then(usage_from),
            session_id: None,
        })
    }

    fn transform_stream_response(&self, chunk: &StreamChunk) -> ProxyResult<Option<StreamEvent>> {
        let payload = &chunk.payload;
        let event_type = chunk.event_name().or_else(|| str_field(payload, "type")).ok_or_else(|| {
            ProxyError::StreamParse { message: format!("{PROVIDER} chunk without event type") }
        })?;

        let event = match event_type {
            "content_block_delta" => {
                let delta = payload.get("delta").ok_or_else(|| ProxyError::StreamParse {
                    message: format!("{PROVIDER} content_block_delta without delta"),
                })?;
                match str_field(delta, "type") {
                    Some("text_delta") => str_field(delta, "text").map(StreamEvent::answer),
                    Some("thinking_delta") => str_field(delta, "thinking").map(StreamEvent::reasoning),
                    _ => None,
                }
            },
            // Prompt tokens only appear on message_start; message_delta carries
            // the running output count.
            "message_start" => {
                payload.pointer("/message/usage").and_then(usage_from).map(|usage| StreamEvent::Usage { usage })
            },
            "message_delta" => payload.get("usage").and_then(usage_from).map(|usage| StreamEvent::Usage { usage }),
            "message_stop" => Some(StreamEvent::Done),
            "error" => {
                let message = payload
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("upstream reported an error");
                Some(StreamEvent::error("provider_stream_error", message))
            },
            _ => None,
        };
        Ok(event)
    }
}
