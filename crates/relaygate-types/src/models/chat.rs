//! Unified chat request and response models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller identity used when none is supplied.
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// Message role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// Kind of an attached file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Document,
}

/// Reference to a file reachable by the upstream over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FileRef {
    pub fn image(url: impl Into<String>) -> Self {
        Self { kind: FileKind::Image, url: url.into(), name: None }
    }

    pub fn document(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self { kind: FileKind::Document, url: url.into(), name: Some(name.into()) }
    }
}

/// One turn of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<FileRef>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), attachments: Vec::new() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

/// Per-call knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatOptions {
    pub stream: bool,
    /// Upstream conversation to continue
    pub session_id: Option<String>,
    /// Named inputs interpreted by workflow-style upstreams
    pub variables: BTreeMap<String, String>,
    pub files: Vec<FileRef>,
    /// Request intermediate reasoning / workflow status events
    pub detail: bool,
    /// Caller identity (rate-limit key, upstream `user`)
    pub user: Option<String>,
}

impl ChatOptions {
    pub fn streaming() -> Self {
        Self { stream: true, ..Self::default() }
    }

    pub fn caller_id(&self) -> &str {
        self.user.as_deref().filter(|u| !u.is_empty()).unwrap_or(ANONYMOUS_CALLER)
    }
}

/// Token accounting reported by the upstream.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Result of a non-streaming call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedChatResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl UnifiedChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Self::default() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_id_falls_back_to_anonymous() {
        assert_eq!(ChatOptions::default().caller_id(), ANONYMOUS_CALLER);
        let opts = ChatOptions { user: Some(String::new()), ..ChatOptions::default() };
        assert_eq!(opts.caller_id(), ANONYMOUS_CALLER);
        let opts = ChatOptions { user: Some("u-42".to_string()), ..ChatOptions::default() };
        assert_eq!(opts.caller_id(), "u-42");
    }

    #[test]
    fn test_response_omits_absent_fields() {
        let json = serde_json::to_value(UnifiedChatResponse::text("hi there")).unwrap();
        assert_eq!(json, serde_json::json!({"content": "hi there"}));
    }

    #[test]
    fn test_usage_total_is_sum() {
        assert_eq!(TokenUsage::new(10, 5).total_tokens, 15);
    }
}
