//! Wire shapes of the conversational-agent platform.

use relaygate_types::{ProxyError, ProxyResult};
use serde::Deserialize;
use serde_json::Value;

use super::super::common::StreamChunk;
use super::PROVIDER;

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerChunk {
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThoughtChunk {
    #[serde(default)]
    pub thought: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressChunk {
    #[serde(default)]
    pub data: NodeData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub usage: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEnd {
    #[serde(default)]
    pub metadata: Metadata,
}

/// Stream events keyed by the `event` field inside the JSON payload.
#[derive(Debug, Clone)]
pub enum AgentChunk {
    Answer(AnswerChunk),
    Thought(ThoughtChunk),
    Progress { event: String, chunk: ProgressChunk },
    MessageEnd(MessageEnd),
    Error(Value),
    Ping,
    Other,
}

impl AgentChunk {
    pub fn event_name(chunk: &StreamChunk) -> Option<&str> {
        chunk.event_name().or_else(|| chunk.payload.get("event").and_then(Value::as_str))
    }

    pub fn decode(chunk: &StreamChunk) -> ProxyResult<Self> {
        let payload = &chunk.payload;
        let decoded = match Self::event_name(chunk) {
            Some("message" | "agent_message") => Self::Answer(parse(payload)?),
            Some("agent_thought") => Self::Thought(parse(payload)?),
            Some(event @ ("workflow_started" | "node_started" | "node_finished" | "workflow_finished")) => {
                Self::Progress { event: event.to_string(), chunk: parse(payload)? }
            },
            Some("message_end") => Self::MessageEnd(parse(payload)?),
            Some("error") => Self::Error(payload.clone()),
            Some("ping") => Self::Ping,
            Some(_) => Self::Other,
            None => {
                return Err(ProxyError::StreamParse {
                    message: format!("{PROVIDER} chunk without event name"),
                })
            },
        };
        Ok(decoded)
    }
}

fn parse<T: for<'de> Deserialize<'de>>(payload: &Value) -> ProxyResult<T> {
    T::deserialize(payload).map_err(|e| ProxyError::StreamParse {
        message: format!("{PROVIDER} chunk: {e}"),
    })
}

/// Body of a `response_mode: blocking` call.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockingResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub updated_at: Value,
    #[serde(default)]
    pub created_at: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageFeedback {
    #[serde(default)]
    pub rating: Option<String>,
}

/// One exchange: the user's query and the agent's answer share an id.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageItem {
    pub id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub feedback: Option<MessageFeedback>,
    #[serde(default)]
    pub created_at: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub opening_statement: Option<String>,
    #[serde(default)]
    pub user_input_form: Vec<Value>,
}
