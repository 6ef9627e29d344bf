//! Provider adapters.
//!
//! One adapter per upstream family. Adapters are pure transcoders: they build
//! [`ProviderRequest`]s and interpret bodies or stream chunks, but never touch
//! the network themselves.

pub mod agent;
pub mod anthropic;
mod common;
pub mod openai;
mod registry;
pub mod workflow;

pub use common::{ProviderRequest, StreamChunk};
pub use registry::ProviderRegistry;

use reqwest::header::HeaderMap;
use relaygate_types::models::{AppInitInfo, ConversationDetail, ConversationPage, ConversationQuery};
use relaygate_types::{
    AgentConfig, ChatMessage, ChatOptions, FeedbackSubmission, ProviderKind, ProxyError,
    ProxyResult, StreamEvent, UnifiedChatResponse,
};
use serde_json::Value;

/// Translation unit for one upstream family.
///
/// The session methods are optional: the defaults report
/// [`ProxyError::UnsupportedOperation`] so the gateway can refuse without
/// making a call.
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Detailed config check; `Err` carries the reason as a config error.
    fn check_config(&self, agent: &AgentConfig) -> ProxyResult<()>;

    /// Cheap, side-effect-free sanity check.
    fn validate_config(&self, agent: &AgentConfig) -> bool {
        self.check_config(agent).is_ok()
    }

    fn build_headers(&self, agent: &AgentConfig) -> ProxyResult<HeaderMap>;

    fn transform_request(
        &self,
        messages: &[ChatMessage],
        agent: &AgentConfig,
        streaming: bool,
        options: &ChatOptions,
    ) -> ProxyResult<ProviderRequest>;

    /// Map a complete non-streaming body. Missing usage stays `None`.
    fn transform_response(&self, body: Value) -> ProxyResult<UnifiedChatResponse>;

    /// Map one decoded stream chunk to zero or one unified events.
    fn transform_stream_response(&self, chunk: &StreamChunk) -> ProxyResult<Option<StreamEvent>>;

    /// Upstream-assigned conversation id carried by a chunk, if any.
    fn stream_session_id(&self, _chunk: &StreamChunk) -> Option<String> {
        None
    }

    /// Reasoning text that shares a chunk with answer text. The chunk's own
    /// event carries the answer; this is surfaced just ahead of it.
    fn stream_reasoning(&self, _chunk: &StreamChunk) -> Option<String> {
        None
    }

    fn list_conversations_request(
        &self,
        _agent: &AgentConfig,
        _caller_id: &str,
        _query: &ConversationQuery,
    ) -> ProxyResult<ProviderRequest> {
        Err(self.unsupported("list_conversations"))
    }

    fn parse_conversation_list(
        &self,
        _body: Value,
        _query: &ConversationQuery,
    ) -> ProxyResult<ConversationPage> {
        Err(self.unsupported("list_conversations"))
    }

    fn get_conversation_request(
        &self,
        _agent: &AgentConfig,
        _caller_id: &str,
        _conversation_id: &str,
    ) -> ProxyResult<ProviderRequest> {
        Err(self.unsupported("get_conversation"))
    }

    fn parse_conversation(
        &self,
        _conversation_id: &str,
        _body: Value,
    ) -> ProxyResult<ConversationDetail> {
        Err(self.unsupported("get_conversation"))
    }

    fn delete_conversation_request(
        &self,
        _agent: &AgentConfig,
        _caller_id: &str,
        _conversation_id: &str,
    ) -> ProxyResult<ProviderRequest> {
        Err(self.unsupported("delete_conversation"))
    }

    fn feedback_request(
        &self,
        _agent: &AgentConfig,
        _caller_id: &str,
        _feedback: &FeedbackSubmission,
    ) -> ProxyResult<ProviderRequest> {
        Err(self.unsupported("submit_feedback"))
    }

    fn init_request(&self, _agent: &AgentConfig, _caller_id: &str) -> ProxyResult<ProviderRequest> {
        Err(self.unsupported("initialize"))
    }

    fn parse_init(&self, _body: Value) -> ProxyResult<AppInitInfo> {
        Err(self.unsupported("initialize"))
    }

    /// Check a write-operation acknowledgement (delete, feedback).
    fn check_ack(&self, _body: &Value, _resource: &str) -> ProxyResult<()> {
        Ok(())
    }

    fn unsupported(&self, operation: &str) -> ProxyError {
        ProxyError::unsupported(self.kind().as_str(), operation)
    }
}
