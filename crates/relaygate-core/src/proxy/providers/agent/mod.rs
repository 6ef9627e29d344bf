//! Conversational-agent platform.
//!
//! The platform keeps history server-side and assigns the conversation id
//! itself: the first call sends an empty `conversation_id`, and the assigned
//! id comes back on the first stream event (or in the blocking body).
//! Only the newest user turn is ever sent.

mod models;


use reqwest::header::HeaderMap;
use relaygate_types::models::{
    AppInitInfo, ConversationDetail, ConversationMessage, ConversationPage, ConversationQuery,
    ConversationSummary,
};
use relaygate_types::{
    AgentConfig, ChatMessage, ChatOptions, ChatRole, FeedbackRating, FeedbackSubmission, FileKind,
    ProviderKind, ProxyError, ProxyResult, StreamEvent, UnifiedChatResponse,
};
use serde_json::{json, Value};

use super::common::{
    bearer_headers, check_attachments, collect_attachments, invalid, last_user_message,
    openai_usage, parse_timestamp, require_credential, str_field, ProviderRequest, StreamChunk,
};
use super::ProviderAdapter;
use crate::proxy::upstream::client::build_url;
use models::{AgentChunk, BlockingResponse, ConversationItem, ListPage, MessageItem, Parameters};

pub(crate) const PROVIDER: &str = "agent-platform";

/// Messages fetched per conversation detail call.
const MESSAGE_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct AgentPlatformAdapter;

impl AgentPlatformAdapter {
    /// `{base}/{segments...}` with each segment percent-encoded.
    fn resource_url(agent: &AgentConfig, segments: &[&str]) -> ProxyResult<String> {
        let mut url = url::Url::parse(agent.base_url())
            .map_err(|e| ProxyError::config(format!("agent {} endpoint is invalid: {e}", agent.id)))?;
        url.path_segments_mut()
            .map_err(|()| ProxyError::config(format!("agent {} endpoint cannot carry a path", agent.id)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }

    fn decode<T: for<'de> serde::Deserialize<'de>>(body: Value, what: &str) -> ProxyResult<T> {
        serde_json::from_value(body).map_err(|e| invalid(PROVIDER, format!("{what}: {e}")))
    }
}

impl ProviderAdapter for AgentPlatformAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AgentPlatform
    }

    fn check_config(&self, agent: &AgentConfig) -> ProxyResult<()> {
        require_credential(agent)
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
        let last_user = last_user_message(messages)?;
        let files = collect_attachments(last_user, &options.files);
        check_attachments(agent, &files)?;

        let wire_files: Vec<Value> = files
            .iter()
            .map(|file| {
                let kind = match file.kind {
                    FileKind::Image => "image",
                    FileKind::Document => "document",
                };
                json!({"type": kind, "transfer_method": "remote_url", "url": file.url})
            })
            .collect();

        let body = json!({
            "inputs": options.variables,
            "query": last_user.content,
            "response_mode": if streaming { "streaming" } else { "blocking" },
            "conversation_id": options.session_id.as_deref().unwrap_or_default(),
            "user": options.caller_id(),
            "files": wire_files,
        });

        let request = ProviderRequest::post(build_url(agent.base_url(), "chat-messages"), body);
        Ok(match &options.session_id {
            Some(session_id) => request.with_session(session_id.clone()),
            None => request,
        })
    }

    fn transform_response(&self, body: Value) -> ProxyResult<UnifiedChatResponse> {
        let parsed: BlockingResponse = Self::decode(body, "blocking response")?;
        Ok(UnifiedChatResponse {
            content: parsed.answer,
            reasoning: None,
            usage: parsed.metadata.usage.as_ref().and_then(openai_usage),
            session_id: parsed.conversation_id.filter(|id| !id.is_empty()),
        })
    }

    fn transform_stream_response(&self, chunk: &StreamChunk) -> ProxyResult<Option<StreamEvent>> {
        let event = match AgentChunk::decode(chunk)? {
            AgentChunk::Answer(answer) if !answer.answer.is_empty() => Some(StreamEvent::answer(answer.answer)),
            AgentChunk::Thought(thought) if !thought.thought.is_empty() => {
                Some(StreamEvent::reasoning(thought.thought))
            },
            AgentChunk::Progress { event, chunk } => Some(StreamEvent::Status {
                status: chunk.data.status.unwrap_or(event),
                name: chunk.data.title,
                detail: Value::Null,
            }),
            AgentChunk::MessageEnd(end) => end
                .metadata
                .usage
                .as_ref()
                .and_then(openai_usage)
                .map(|usage| StreamEvent::Usage { usage }),
            AgentChunk::Error(payload) => {
                let message = str_field(&payload, "message").unwrap_or("upstream reported an error");
                Some(StreamEvent::error("provider_stream_error", message))
            },
            AgentChunk::Answer(_) | AgentChunk::Thought(_) | AgentChunk::Ping | AgentChunk::Other => None,
        };
        Ok(event)
    }

    fn stream_session_id(&self, chunk: &StreamChunk) -> Option<String> {
        str_field(&chunk.payload, "conversation_id").filter(|id| !id.is_empty()).map(str::to_string)
    }

    fn list_conversations_request(
        &self,
        agent: &AgentConfig,
        caller_id: &str,
        query: &ConversationQuery,
    ) -> ProxyResult<ProviderRequest> {
        let mut request = ProviderRequest::get(build_url(agent.base_url(), "conversations"))
            .with_query("user", caller_id)
            .with_query("limit", query.limit.to_string())
            .with_query("sort_by", "-updated_at");
        if let Some(cursor) = query.cursor.as_deref().filter(|c| !c.is_empty()) {
            request = request.with_query("last_id", cursor);
        }
        Ok(request)
    }

    fn parse_conversation_list(
        &self,
        body: Value,
        query: &ConversationQuery,
    ) -> ProxyResult<ConversationPage> {
        let page: ListPage<ConversationItem> = Self::decode(body, "conversation page")?;
        // The cursor is the last id the upstream returned, filtered or not.
        let next_cursor = if page.has_more { page.data.last().map(|item| item.id.clone()) } else { None };

        let conversations = page
            .data
            .into_iter()
            .map(|item| {
                let extra = match item.status {
                    Some(status) => json!({"status": status, "created_at": item.created_at}),
                    None => Value::Null,
                };
                ConversationSummary {
                    id: item.id,
                    title: item.name,
                    updated_at: parse_timestamp(&item.updated_at),
                    extra,
                }
            })
            .filter(|summary| query.admits(summary.updated_at))
            .collect();

        Ok(ConversationPage { conversations, has_more: next_cursor.is_some(), next_cursor })
    }

    fn get_conversation_request(
        &self,
        agent: &AgentConfig,
        caller_id: &str,
        conversation_id: &str,
    ) -> ProxyResult<ProviderRequest> {
        Ok(ProviderRequest::get(build_url(agent.base_url(), "messages"))
            .with_query("user", caller_id)
            .with_query("conversation_id", conversation_id)
            .with_query("limit", MESSAGE_PAGE_SIZE.to_string()))
    }

    fn parse_conversation(
        &self,
        conversation_id: &str,
        body: Value,
    ) -> ProxyResult<ConversationDetail> {
        let page: ListPage<MessageItem> = Self::decode(body, "message page")?;
        let mut messages = Vec::with_capacity(page.data.len() * 2);
        for item in page.data {
            let created_at = parse_timestamp(&item.created_at);
            let feedback = item.feedback.and_then(|f| f.rating).and_then(|rating| match rating.as_str() {
                "like" => Some(FeedbackRating::Like),
                "dislike" => Some(FeedbackRating::Dislike),
                _ => None,
            });
            if !item.query.is_empty() {
                messages.push(ConversationMessage {
                    id: None,
                    role: ChatRole::User,
                    content: item.query,
                    created_at,
                    feedback: None,
                });
            }
            messages.push(ConversationMessage {
                id: Some(item.id),
                role: ChatRole::Assistant,
                content: item.answer,
                created_at,
                feedback,
            });
        }
        Ok(ConversationDetail { id: conversation_id.to_string(), messages })
    }

    fn delete_conversation_request(
        &self,
        agent: &AgentConfig,
        caller_id: &str,
        conversation_id: &str,
    ) -> ProxyResult<ProviderRequest> {
        Ok(ProviderRequest::delete(Self::resource_url(agent, &["conversations", conversation_id])?)
            .with_body(json!({"user": caller_id})))
    }

    fn feedback_request(
        &self,
        agent: &AgentConfig,
        caller_id: &str,
        feedback: &FeedbackSubmission,
    ) -> ProxyResult<ProviderRequest> {
        let rating = match feedback.rating {
            FeedbackRating::Like => json!("like"),
            FeedbackRating::Dislike => json!("dislike"),
            FeedbackRating::Clear => Value::Null,
        };
        let url = Self::resource_url(agent, &["messages", &feedback.message_id, "feedbacks"])?;
        Ok(ProviderRequest::post(
            url,
            json!({"rating": rating, "user": caller_id, "content": feedback.comment}),
        ))
    }

    fn init_request(&self, agent: &AgentConfig, caller_id: &str) -> ProxyResult<ProviderRequest> {
        Ok(ProviderRequest::get(build_url(agent.base_url(), "parameters")).with_query("user", caller_id))
    }

    fn parse_init(&self, body: Value) -> ProxyResult<AppInitInfo> {
        let params: Parameters = Self::decode(body, "parameters")?;
        Ok(AppInitInfo {
            app_name: None,
            welcome_text: params.opening_statement.filter(|t| !t.is_empty()),
            variables: params.user_input_form,
        })
    }

    fn check_ack(&self, body: &Value, resource: &str) -> ProxyResult<()> {
        match str_field(body, "result") {
            None | Some("success") => Ok(()),
            Some(other) => Err(invalid(PROVIDER, format!("{resource}: upstream answered {other:?}"))),
        }
    }
}
