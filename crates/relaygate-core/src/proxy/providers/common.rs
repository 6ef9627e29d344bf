//! Request envelope, decoded stream chunk and helpers shared by adapters.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Method;
use relaygate_types::{
    AgentConfig, ChatMessage, ChatRole, FileKind, FileRef, ProxyError, ProxyResult, TokenUsage,
};
use serde_json::Value;

use crate::proxy::common::SseFrame;

/// Transport-ready description of one upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Conversation id fixed at request time (caller-supplied or generated)
    pub session_id: Option<String>,
}

impl ProviderRequest {
    fn new(method: Method, url: String) -> Self {
        Self { method, url, query: Vec::new(), body: None, session_id: None }
    }

    pub fn get(url: String) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: String, body: Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn delete(url: String) -> Self {
        Self::new(Method::DELETE, url)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// One framed upstream event with its payload decoded.
///
/// Payloads that look like JSON are parsed; anything else (e.g. `[DONE]`)
/// is kept as a JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub event: Option<String>,
    pub payload: Value,
}

impl StreamChunk {
    pub fn new(event: Option<&str>, payload: Value) -> Self {
        Self { event: event.map(str::to_string), payload }
    }

    pub fn from_frame(frame: SseFrame) -> Result<Self, ProxyError> {
        let trimmed = frame.data.trim();
        let payload = if trimmed.starts_with('{') || trimmed.starts_with('[') {
            serde_json::from_str(trimmed).map_err(|e| ProxyError::StreamParse {
                message: format!("undecodable JSON payload: {e}"),
            })?
        } else if trimmed.is_empty() {
            Value::Null
        } else {
            Value::String(trimmed.to_string())
        };
        Ok(Self { event: frame.event, payload })
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// `[DONE]` sentinel used by OpenAI-style streams.
    pub fn is_done_marker(&self) -> bool {
        self.payload.as_str() == Some("[DONE]")
    }
}

pub(crate) fn require_credential(agent: &AgentConfig) -> ProxyResult<()> {
    if agent.credential.trim().is_empty() {
        return Err(ProxyError::config(format!("agent {} has no credential", agent.id)));
    }
    Ok(())
}

pub(crate) fn require_model(agent: &AgentConfig) -> ProxyResult<&str> {
    agent
        .model
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ProxyError::config(format!("agent {} has no model configured", agent.id)))
}

pub(crate) fn header_value(value: &str) -> ProxyResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ProxyError::config(format!("credential is not a valid header value: {e}")))
}

pub(crate) fn bearer_headers(credential: &str) -> ProxyResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::AUTHORIZATION, header_value(&format!("Bearer {credential}"))?);
    Ok(headers)
}

/// Reject attachments the agent did not declare support for.
pub(crate) fn check_attachments(agent: &AgentConfig, files: &[&FileRef]) -> ProxyResult<()> {
    for file in files {
        let allowed = match file.kind {
            FileKind::Image => agent.capabilities.supports_images,
            FileKind::Document => agent.capabilities.supports_files,
        };
        if !allowed {
            return Err(ProxyError::config(format!(
                "agent {} does not accept {} attachments",
                agent.id,
                match file.kind {
                    FileKind::Image => "image",
                    FileKind::Document => "document",
                }
            )));
        }
    }
    Ok(())
}

/// Per-message attachments plus call-level files, in that order.
pub(crate) fn collect_attachments<'a>(
    message: &'a ChatMessage,
    extra: &'a [FileRef],
) -> Vec<&'a FileRef> {
    message.attachments.iter().chain(extra.iter()).collect()
}

pub(crate) fn last_user_message(messages: &[ChatMessage]) -> ProxyResult<&ChatMessage> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .ok_or_else(|| ProxyError::config("conversation contains no user message"))
}

/// Text of an OpenAI-style `content`, which is a string or an array of parts.
pub(crate) fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| {
                part.get("text")
                    .and_then(|t| t.as_str().or_else(|| t.get("content").and_then(Value::as_str)))
            })
            .collect(),
        _ => String::new(),
    }
}

/// `{prompt_tokens, completion_tokens[, total_tokens]}` usage block.
pub(crate) fn openai_usage(usage: &Value) -> Option<TokenUsage> {
    let prompt = usage.get("prompt_tokens")?.as_u64()?;
    let completion = usage.get("completion_tokens")?.as_u64()?;
    let mut parsed = TokenUsage::new(clamp_u32(prompt), clamp_u32(completion));
    if let Some(total) = usage.get("total_tokens").and_then(Value::as_u64) {
        parsed.total_tokens = clamp_u32(total);
    }
    Some(parsed)
}

pub(crate) fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// RFC 3339 strings, or unix seconds as integers.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => Utc.timestamp_opt(n.as_i64()?, 0).single(),
        _ => None,
    }
}

pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

pub(crate) fn invalid(provider: &str, message: impl Into<String>) -> ProxyError {
    ProxyError::invalid_response(provider, message)
}
