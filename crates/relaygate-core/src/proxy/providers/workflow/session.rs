//! Management API of the workflow platform: history, records, feedback, init.
//!
//! Every answer is wrapped in an [`ApiEnvelope`]; a non-200 `code` is an
//! application-level failure even when the HTTP status was 200.

use relaygate_types::models::{
    AppInitInfo, ConversationDetail, ConversationMessage, ConversationPage, ConversationQuery,
    ConversationSummary,
};
use relaygate_types::{AgentConfig, ChatRole, FeedbackRating, FeedbackSubmission, ProxyError, ProxyResult};
use serde_json::{json, Map, Value};

use super::models::{ApiEnvelope, ChatRecord, HistoryItem, InitData, PagedList};
use super::PROVIDER;
use crate::proxy::providers::common::{invalid, parse_timestamp, ProviderRequest};
use crate::proxy::upstream::client::build_url;

/// Records fetched per conversation. The platform caps pages well above this.
const RECORD_PAGE_SIZE: u32 = 100;

fn is_missing(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("not exist") || lower.contains("not found")
}

/// Strip the envelope and return `data`, or classify the failure.
pub(super) fn unwrap_envelope(body: Value, resource: &str) -> ProxyResult<Value> {
    if body.is_null() {
        return Ok(Value::Null);
    }
    let envelope: ApiEnvelope =
        serde_json::from_value(body).map_err(|e| invalid(PROVIDER, format!("unexpected envelope: {e}")))?;
    if envelope.code == 200 {
        return Ok(envelope.data);
    }

    let reason = if envelope.message.is_empty() { envelope.status_text } else { envelope.message };
    if is_missing(&reason) {
        return Err(ProxyError::SessionNotFound { resource: resource.to_string() });
    }
    Err(invalid(PROVIDER, format!("code {}: {reason}", envelope.code)))
}

fn decode<T: for<'de> serde::Deserialize<'de>>(data: Value, what: &str) -> ProxyResult<T> {
    serde_json::from_value(data).map_err(|e| invalid(PROVIDER, format!("{what}: {e}")))
}

fn cursor_offset(query: &ConversationQuery) -> ProxyResult<u64> {
    match query.cursor.as_deref() {
        None | Some("") => Ok(0),
        Some(cursor) => cursor
            .parse::<u64>()
            .map_err(|_| ProxyError::config(format!("cursor {cursor:?} is not a page offset"))),
    }
}

pub(super) fn list_request(
    agent: &AgentConfig,
    app_id: &str,
    query: &ConversationQuery,
) -> ProxyResult<ProviderRequest> {
    let body = json!({
        "appId": app_id,
        "offset": cursor_offset(query)?,
        "pageSize": query.limit,
        "source": "api",
    });
    Ok(ProviderRequest::post(build_url(agent.base_url(), "core/chat/getHistories"), body))
}

pub(super) fn parse_list(body: Value, query: &ConversationQuery) -> ProxyResult<ConversationPage> {
    let offset = cursor_offset(query)?;
    let page: PagedList<HistoryItem> = decode(unwrap_envelope(body, "conversation list")?, "history page")?;

    let fetched = page.list.len() as u64;
    let conversations = page
        .list
        .into_iter()
        .map(|item| {
            let title = item.custom_title.filter(|t| !t.is_empty()).unwrap_or(item.title);
            ConversationSummary {
                id: item.chat_id,
                title,
                updated_at: parse_timestamp(&item.update_time),
                extra: item.top.map_or(Value::Null, |top| json!({"top": top})),
            }
        })
        .filter(|summary| query.admits(summary.updated_at))
        .collect();

    let consumed = offset + fetched;
    let has_more = fetched > 0 && consumed < page.total;
    Ok(ConversationPage {
        conversations,
        has_more,
        next_cursor: has_more.then(|| consumed.to_string()),
    })
}

pub(super) fn records_request(agent: &AgentConfig, app_id: &str, conversation_id: &str) -> ProviderRequest {
    let body = json!({
        "appId": app_id,
        "chatId": conversation_id,
        "offset": 0,
        "pageSize": RECORD_PAGE_SIZE,
        "loadCustomFeedbacks": true,
    });
    ProviderRequest::post(build_url(agent.base_url(), "core/chat/getPaginationRecords"), body)
}

fn record_text(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(|part| part.pointer("/text/content").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

fn record_message(record: ChatRecord) -> Option<ConversationMessage> {
    let role = match record.obj.as_str() {
        "Human" => ChatRole::User,
        "AI" => ChatRole::Assistant,
        "System" => ChatRole::System,
        _ => return None,
    };
    let feedback = if record.user_good_feedback.is_some() {
        Some(FeedbackRating::Like)
    } else if record.user_bad_feedback.is_some() {
        Some(FeedbackRating::Dislike)
    } else {
        None
    };
    Some(ConversationMessage {
        id: record.data_id,
        role,
        content: record_text(&record.value),
        created_at: parse_timestamp(&record.time),
        feedback,
    })
}

pub(super) fn parse_records(conversation_id: &str, body: Value) -> ProxyResult<ConversationDetail> {
    let resource = format!("conversation {conversation_id}");
    let page: PagedList<ChatRecord> = decode(unwrap_envelope(body, &resource)?, "record page")?;
    Ok(ConversationDetail {
        id: conversation_id.to_string(),
        messages: page.list.into_iter().filter_map(record_message).collect(),
    })
}

pub(super) fn delete_request(agent: &AgentConfig, app_id: &str, conversation_id: &str) -> ProviderRequest {
    ProviderRequest::delete(build_url(agent.base_url(), "core/chat/delHistory"))
        .with_query("chatId", conversation_id)
        .with_query("appId", app_id)
}

/// `Clear` sends neither flag, which resets both on the platform.
pub(super) fn feedback_request(
    agent: &AgentConfig,
    app_id: &str,
    feedback: &FeedbackSubmission,
) -> ProviderRequest {
    let mut body = Map::new();
    body.insert("appId".to_string(), json!(app_id));
    body.insert("chatId".to_string(), json!(feedback.conversation_id));
    body.insert("dataId".to_string(), json!(feedback.message_id));
    match feedback.rating {
        FeedbackRating::Like => {
            body.insert("userGoodFeedback".to_string(), json!("yes"));
        },
        FeedbackRating::Dislike => {
            let reason = feedback.comment.clone().filter(|c| !c.is_empty()).unwrap_or_else(|| "yes".to_string());
            body.insert("userBadFeedback".to_string(), json!(reason));
        },
        FeedbackRating::Clear => {},
    }
    ProviderRequest::post(
        build_url(agent.base_url(), "core/chat/feedback/updateUserFeedback"),
        Value::Object(body),
    )
}

pub(super) fn init_request(agent: &AgentConfig, app_id: &str) -> ProviderRequest {
    ProviderRequest::get(build_url(agent.base_url(), "core/chat/init")).with_query("appId", app_id)
}

pub(super) fn parse_init(body: Value) -> ProxyResult<AppInitInfo> {
    let data: InitData = decode(unwrap_envelope(body, "app")?, "init data")?;
    let app = data.app;
    Ok(AppInitInfo {
        app_name: app.name,
        welcome_text: app.chat_config.welcome_text.filter(|t| !t.is_empty()),
        variables: app.chat_config.variables,
    })
}
