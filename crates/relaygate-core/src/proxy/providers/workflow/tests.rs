use super::*;
use relaygate_types::models::{ConversationMessage, ConversationQuery};
use relaygate_types::{ChatRole, FeedbackRating};
use reqwest::Method;

const APP_ID: &str = "65f0a1b2c3d4e5f6a7b8c9d0";

fn agent() -> AgentConfig {
    AgentConfig::new("kb-bot", ProviderKind::WorkflowPlatform, "https://flow.example/api/")
        .with_credential("fk-test")
        .with_app_id(APP_ID)
}

fn chunk(event: Option<&str>, payload: Value) -> StreamChunk {
    StreamChunk::new(event, payload)
}

#[test]
fn test_app_id_validation() {
    assert!(is_valid_app_id(APP_ID));
    assert!(!is_valid_app_id("65F0A1B2C3D4E5F6A7B8C9D0"));
    assert!(!is_valid_app_id("65f0a1"));

    let adapter = WorkflowAdapter;
    assert!(adapter.validate_config(&agent()));

    let mut missing = agent();
    missing.app_id = None;
    assert_eq!(adapter.check_config(&missing).unwrap_err().kind(), "config_error");

    let no_key = agent().with_credential("");
    assert!(!adapter.validate_config(&no_key));
}

#[test]
fn test_new_conversation_sends_full_history() {
    let messages = vec![
        ChatMessage::user("hello"),
        ChatMessage::assistant("hi, how can I help?"),
        ChatMessage::user("what is relaygate?"),
    ];
    let request = WorkflowAdapter
        .transform_request(&messages, &agent(), false, &ChatOptions::default())
        .unwrap();

    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, "https://flow.example/api/v1/chat/completions");
    let body = request.body.unwrap();
    assert_eq!(body["appId"], APP_ID);
    assert_eq!(body["stream"], false);
    assert_eq!(body["detail"], false);
    assert_eq!(body["messages"].as_array().unwrap().len(), 3);

    let chat_id = body["chatId"].as_str().unwrap();
    assert_eq!(chat_id.len(), 32);
    assert_eq!(request.session_id.as_deref(), Some(chat_id));
}

#[test]
fn test_continuation_sends_last_user_turn_only() {
    let messages = vec![ChatMessage::user("first"), ChatMessage::assistant("reply"), ChatMessage::user("second")];
    let options = ChatOptions {
        session_id: Some("chat-7".to_string()),
        detail: true,
        user: Some("u-1".to_string()),
        ..ChatOptions::default()
    };
    let request = WorkflowAdapter.transform_request(&messages, &agent(), true, &options).unwrap();
    let body = request.body.unwrap();

    assert_eq!(body["chatId"], "chat-7");
    assert_eq!(body["messages"], json!([{"role": "user", "content": "second"}]));
    assert_eq!(body["customUid"], "u-1");
    // detail is only forwarded when the agent declares support for it
    assert_eq!(body["detail"], false);
    assert_eq!(request.session_id.as_deref(), Some("chat-7"));
}

#[test]
fn test_attachments_follow_capabilities() {
    let mut message = ChatMessage::user("what is in this picture?");
    message.attachments.push(FileRef::image("https://cdn.example/cat.png"));

    let err = WorkflowAdapter
        .transform_request(&[message.clone()], &agent(), false, &ChatOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), "config_error");

    let mut capable = agent();
    capable.capabilities.supports_images = true;
    let request = WorkflowAdapter
        .transform_request(&[message], &capable, false, &ChatOptions::default())
        .unwrap();
    let content = &request.body.unwrap()["messages"][0]["content"];
    assert_eq!(content[1]["image_url"]["url"], "https://cdn.example/cat.png");
}

#[test]
fn test_transform_response() {
    let body = json!({
        "id": "chat-1",
        "choices": [{"message": {"role": "assistant", "content": "hi there"}}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
    });
    let response = WorkflowAdapter.transform_response(body).unwrap();
    assert_eq!(response.content, "hi there");
    assert_eq!(response.usage.map(|u| u.total_tokens), Some(7));

    let err = WorkflowAdapter.transform_response(json!({"choices": []})).unwrap_err();
    assert_eq!(err.kind(), "invalid_response");
}

#[test]
fn test_stream_mapping() {
    let adapter = WorkflowAdapter;
    let delta = |text: &str| json!({"choices": [{"delta": {"content": text}}]});

    assert_eq!(
        adapter.transform_stream_response(&chunk(None, delta("hi"))).unwrap(),
        Some(StreamEvent::answer("hi"))
    );
    assert_eq!(
        adapter.transform_stream_response(&chunk(Some("answer"), delta(" there"))).unwrap(),
        Some(StreamEvent::answer(" there"))
    );
    assert_eq!(
        adapter
            .transform_stream_response(&chunk(
                Some("answer"),
                json!({"choices": [{"delta": {"reasoning_content": "thinking"}}]})
            ))
            .unwrap(),
        Some(StreamEvent::reasoning("thinking"))
    );
    assert_eq!(
        adapter
            .transform_stream_response(&chunk(
                Some("flowNodeStatus"),
                json!({"status": "running", "name": "Knowledge search"})
            ))
            .unwrap(),
        Some(StreamEvent::Status {
            status: "running".to_string(),
            name: Some("Knowledge search".to_string()),
            detail: Value::Null,
        })
    );
    assert_eq!(
        adapter.transform_stream_response(&chunk(None, json!("[DONE]"))).unwrap(),
        Some(StreamEvent::Done)
    );
    assert_eq!(adapter.transform_stream_response(&chunk(Some("heartbeat"), json!({}))).unwrap(), None);
}

#[test]
fn test_stream_error_and_malformed_chunks() {
    let adapter = WorkflowAdapter;
    let event = adapter
        .transform_stream_response(&chunk(Some("error"), json!({"message": "quota exhausted"})))
        .unwrap();
    assert_eq!(event, Some(StreamEvent::error("provider_stream_error", "quota exhausted")));

    let err = adapter
        .transform_stream_response(&chunk(Some("flowNodeStatus"), json!({"name": 3})))
        .unwrap_err();
    assert_eq!(err.kind(), "stream_parse_error");
}

#[test]
fn test_list_request_and_page() {
    let query = ConversationQuery { limit: 2, cursor: Some("2".to_string()), ..ConversationQuery::default() };
    let request = WorkflowAdapter.list_conversations_request(&agent(), "u-1", &query).unwrap();
    assert_eq!(request.url, "https://flow.example/api/core/chat/getHistories");
    assert_eq!(request.body.as_ref().unwrap()["offset"], 2);
    assert_eq!(request.body.as_ref().unwrap()["pageSize"], 2);

    let body = json!({
        "code": 200,
        "data": {
            "list": [
                {"chatId": "c-3", "title": "Pricing", "customTitle": "", "updateTime": "2026-03-01T10:00:00Z"},
                {"chatId": "c-4", "title": "Onboarding", "customTitle": "Day one", "updateTime": "2026-03-02T10:00:00Z", "top": true}
            ],
            "total": 5
        }
    });
    let page = WorkflowAdapter.parse_conversation_list(body, &query).unwrap();
    assert_eq!(page.conversations.len(), 2);
    assert_eq!(page.conversations[0].title, "Pricing");
    assert_eq!(page.conversations[1].title, "Day one");
    assert_eq!(page.conversations[1].extra, json!({"top": true}));
    assert!(page.has_more);
    assert_eq!(page.next_cursor.as_deref(), Some("4"));
}

#[test]
fn test_bad_cursor_is_rejected() {
    let query = ConversationQuery { cursor: Some("abc".to_string()), ..ConversationQuery::default() };
    let err = WorkflowAdapter.list_conversations_request(&agent(), "u-1", &query).unwrap_err();
    assert_eq!(err.kind(), "config_error");
}

#[test]
fn test_parse_records() {
    let body = json!({
        "code": 200,
        "data": {
            "list": [
                {"dataId": "d-1", "obj": "Human", "value": [{"type": "text", "text": {"content": "hello"}}]},
                {"dataId": "d-2", "obj": "AI", "value": [{"type": "text", "text": {"content": "hi there"}}], "userGoodFeedback": "yes"},
                {"dataId": "d-3", "obj": "Plugin", "value": []}
            ],
            "total": 3
        }
    });
    let detail = WorkflowAdapter.parse_conversation("c-1", body).unwrap();
    assert_eq!(detail.id, "c-1");
    assert_eq!(
        detail.messages[1],
        ConversationMessage {
            id: Some("d-2".to_string()),
            role: ChatRole::Assistant,
            content: "hi there".to_string(),
            created_at: None,
            feedback: Some(FeedbackRating::Like),
        }
    );
    assert_eq!(detail.messages.len(), 2);
}

#[test]
fn test_envelope_not_found() {
    let body = json!({"code": 500, "statusText": "error", "message": "Chat not exist"});
    let err = WorkflowAdapter.parse_conversation("c-9", body).unwrap_err();
    assert_eq!(err, ProxyError::SessionNotFound { resource: "conversation c-9".to_string() });

    let other = json!({"code": 403, "message": "permission denied"});
    assert_eq!(WorkflowAdapter.check_ack(&other, "conversation c-9").unwrap_err().kind(), "invalid_response");
    assert!(WorkflowAdapter.check_ack(&Value::Null, "conversation c-9").is_ok());
}

#[test]
fn test_delete_and_feedback_requests() {
    let delete = WorkflowAdapter.delete_conversation_request(&agent(), "u-1", "c-1").unwrap();
    assert_eq!(delete.method, Method::DELETE);
    assert_eq!(delete.query_value("chatId"), Some("c-1"));
    assert_eq!(delete.query_value("appId"), Some(APP_ID));

    let submission = FeedbackSubmission {
        conversation_id: "c-1".to_string(),
        message_id: "d-2".to_string(),
        rating: FeedbackRating::Dislike,
        comment: Some("outdated answer".to_string()),
    };
    let feedback = WorkflowAdapter.feedback_request(&agent(), "u-1", &submission).unwrap();
    let body = feedback.body.unwrap();
    assert_eq!(body["dataId"], "d-2");
    assert_eq!(body["userBadFeedback"], "outdated answer");
    assert!(body.get("userGoodFeedback").is_none());

    let cleared = FeedbackSubmission { rating: FeedbackRating::Clear, comment: None, ..submission };
    let body = WorkflowAdapter.feedback_request(&agent(), "u-1", &cleared).unwrap().body.unwrap();
    assert!(body.get("userBadFeedback").is_none());
}

#[test]
fn test_parse_init() {
    let request = WorkflowAdapter.init_request(&agent(), "u-1").unwrap();
    assert_eq!(request.query_value("appId"), Some(APP_ID));

    let body = json!({
        "code": 200,
        "data": {
            "app": {
                "name": "Support KB",
                "chatConfig": {
                    "welcomeText": "Ask me anything",
                    "variables": [{"key": "region", "type": "select"}]
                }
            }
        }
    });
    let info = WorkflowAdapter.parse_init(body).unwrap();
    assert_eq!(info.app_name.as_deref(), Some("Support KB"));
    assert_eq!(info.welcome_text.as_deref(), Some("Ask me anything"));
    assert_eq!(info.variables.len(), 1);
}
