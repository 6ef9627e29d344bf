//! Caller-facing wire contract.
//!
//! Request and response bodies exchanged with the surrounding system. The
//! unified models in [`crate::models`] are what the core works with; these
//! types only add the outer envelope.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ProxyError;
use crate::models::{ChatMessage, ChatOptions, FeedbackRating, FileRef};

/// Body of `POST /v1/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub agent_id: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub detail: bool,
    #[serde(default)]
    pub user: Option<String>,
}

impl ChatRequest {
    /// Split into agent id, history and per-call options.
    pub fn into_parts(self) -> (String, Vec<ChatMessage>, ChatOptions) {
        let options = ChatOptions {
            stream: self.stream,
            session_id: self.session_id,
            variables: self.variables,
            files: self.files,
            detail: self.detail,
            user: self.user,
        };
        (self.agent_id, self.messages, options)
    }
}

/// Body of the feedback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackRequest {
    pub rating: FeedbackRating,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Error envelope returned for failed non-streaming calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl From<&ProxyError> for ErrorBody {
    fn from(err: &ProxyError) -> Self {
        Self {
            error: ErrorDetail {
                kind: err.kind().to_string(),
                message: err.to_string(),
                retry_after_ms: err.retry_after_ms(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::ChatRole;

    #[test]
    fn test_chat_request_wire_shape() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "agentId": "wf",
            "messages": [{"role": "user", "content": "hello"}],
            "stream": true,
            "sessionId": "chat-1",
            "variables": {"lang": "en"},
            "detail": true
        }))
        .unwrap();

        let (agent_id, messages, options) = req.into_parts();
        assert_eq!(agent_id, "wf");
        assert_eq!(messages[0].role, ChatRole::User);
        assert!(options.stream);
        assert!(options.detail);
        assert_eq!(options.session_id.as_deref(), Some("chat-1"));
        assert_eq!(options.variables.get("lang").map(String::as_str), Some("en"));
    }

    #[test]
    fn test_error_body_carries_retry_hint() {
        let err = ProxyError::RateLimitExceeded { scope: "agent:wf".to_string(), retry_after_ms: 1500 };
        let body = ErrorBody::from(&err);
        assert_eq!(body.error.kind, "rate_limit_exceeded");
        assert_eq!(body.error.retry_after_ms, Some(1500));
    }
}
