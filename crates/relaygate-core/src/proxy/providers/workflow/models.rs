//! Wire shapes of the workflow platform.

use relaygate_types::{ProxyError, ProxyResult};
use serde::Deserialize;
use serde_json::Value;

use super::super::common::StreamChunk;
use super::PROVIDER;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

/// OpenAI-shaped delta carried by `answer` / `fastAnswer` events.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowNodeStatus {
    pub status: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Closed set of known stream events plus an opaque passthrough.
#[derive(Debug, Clone)]
pub enum WorkflowChunk {
    Answer(CompletionChunk),
    NodeStatus(FlowNodeStatus),
    Interactive(Value),
    FlowResponses(Value),
    /// Tool call / variable update progress
    Progress { event: String, payload: Value },
    Error(Value),
    Done,
    Other(Value),
}

impl WorkflowChunk {
    pub fn decode(chunk: &StreamChunk) -> ProxyResult<Self> {
        if chunk.is_done_marker() {
            return Ok(Self::Done);
        }
        let payload = &chunk.payload;
        let decoded = match chunk.event_name() {
            // Without detail mode the platform omits event names entirely.
            None | Some("answer" | "fastAnswer") => Self::Answer(parse(payload)?),
            Some("flowNodeStatus") => Self::NodeStatus(parse(payload)?),
            Some("interactive") => Self::Interactive(payload.clone()),
            Some("flowResponses") => Self::FlowResponses(payload.clone()),
            Some(event @ ("toolCall" | "toolParams" | "toolResponse" | "updateVariables")) => {
                Self::Progress { event: event.to_string(), payload: payload.clone() }
            },
            Some("error") => Self::Error(payload.clone()),
            Some(_) => Self::Other(payload.clone()),
        };
        Ok(decoded)
    }
}

fn parse<T: for<'de> Deserialize<'de>>(payload: &Value) -> ProxyResult<T> {
    T::deserialize(payload).map_err(|e| ProxyError::StreamParse {
        message: format!("{PROVIDER} chunk: {e}"),
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: Option<Value>,
}

/// `{code, statusText, message, data}` wrapper used by the management API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default = "default_code")]
    pub code: i64,
    #[serde(default, rename = "statusText")]
    pub status_text: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

fn default_code() -> i64 {
    200
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub chat_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub custom_title: Option<String>,
    #[serde(default)]
    pub update_time: Value,
    #[serde(default)]
    pub top: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PagedList<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    #[serde(default)]
    pub data_id: Option<String>,
    pub obj: String,
    #[serde(default)]
    pub value: Vec<Value>,
    #[serde(default)]
    pub time: Value,
    #[serde(default)]
    pub user_good_feedback: Option<String>,
    #[serde(default)]
    pub user_bad_feedback: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    #[serde(default)]
    pub welcome_text: Option<String>,
    #[serde(default)]
    pub variables: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitApp {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub chat_config: ChatConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitData {
    #[serde(default)]
    pub app: InitApp,
}
