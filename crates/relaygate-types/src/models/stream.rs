//! Unified streaming event vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chat::TokenUsage;
use crate::error::ProxyError;

/// One event of a unified chat stream.
///
/// Every stream ends with exactly one `Done` or `Error`, and nothing follows it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StreamEvent {
    AnswerDelta {
        text: String,
    },
    ReasoningDelta {
        text: String,
    },
    /// Workflow / node progress
    Status {
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        detail: Value,
    },
    /// Upstream paused for user input
    Interactive {
        payload: Value,
    },
    SessionId {
        session_id: String,
    },
    Usage {
        usage: TokenUsage,
    },
    Error {
        error_kind: String,
        message: String,
    },
    Done,
}

impl StreamEvent {
    pub fn answer(text: impl Into<String>) -> Self {
        Self::AnswerDelta { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::ReasoningDelta { text: text.into() }
    }

    pub fn session(session_id: impl Into<String>) -> Self {
        Self::SessionId { session_id: session_id.into() }
    }

    pub fn error(error_kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error { error_kind: error_kind.into(), message: message.into() }
    }

    /// Wire name used as the SSE `event:` field.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::AnswerDelta { .. } => "answer-delta",
            Self::ReasoningDelta { .. } => "reasoning-delta",
            Self::Status { .. } => "status",
            Self::Interactive { .. } => "interactive",
            Self::SessionId { .. } => "session-id",
            Self::Usage { .. } => "usage",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Event body without the `kind` tag, used as the SSE `data:` field.
    pub fn data(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.remove("kind");
        }
        value
    }
}

impl From<&ProxyError> for StreamEvent {
    fn from(err: &ProxyError) -> Self {
        Self::error(err.kind(), err.to_string())
    }
}
