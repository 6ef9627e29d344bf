use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relaygate_core::StaticAgentDirectory;
use relaygate_types::models::BucketConfig;
use relaygate_types::{AgentConfig, GatewayConfig, ProviderKind, RateLimitConfig};

use super::app;
use crate::state::AppState;

const APP_ID: &str = "000000000000000000000001";

fn agents(upstream: &MockServer) -> Vec<AgentConfig> {
    vec![
        AgentConfig::new("kb-bot", ProviderKind::WorkflowPlatform, format!("{}/api", upstream.uri()))
            .with_credential("fk-test")
            .with_app_id(APP_ID),
        AgentConfig::new("gpt", ProviderKind::OpenAiChat, format!("{}/v1", upstream.uri()))
            .with_credential("sk-test")
            .with_model("gpt-4o-mini"),
    ]
}

fn test_server(upstream: &MockServer, config: GatewayConfig) -> TestServer {
    let directory = StaticAgentDirectory::new(agents(upstream)).expect("unique agent ids");
    let state = AppState::new_with_components(Arc::new(directory), &config).expect("state builds");
    TestServer::new(app(state)).expect("test server starts")
}

fn caller(id: &'static str) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static("x-caller-id"), HeaderValue::from_static(id))
}

async fn mount_completion(upstream: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        })))
        .mount(upstream)
        .await;
}

#[tokio::test]
async fn test_health() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream, GatewayConfig::default());

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"status": "ok"}));
    server.get("/healthz").await.assert_status_ok();
}

#[tokio::test]
async fn test_agent_listing() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream, GatewayConfig::default());

    let response = server.get("/v1/agents").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"agents": ["gpt", "kb-bot"]}));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream, GatewayConfig::default());
    server.get("/v2/nothing").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_json() {
    let upstream = MockServer::start().await;
    mount_completion(&upstream, "hi there").await;
    let server = test_server(&upstream, GatewayConfig::default());

    let response = server
        .post("/v1/chat")
        .json(&json!({
            "agentId": "kb-bot",
            "messages": [{"role": "user", "content": "hello"}],
            "sessionId": "chat-1"
        }))
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["content"], "hi there");
    assert_eq!(body["sessionId"], "chat-1");
}

#[tokio::test]
async fn test_chat_stream_frames() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
            "data: [DONE]\n\n",
        )))
        .mount(&upstream)
        .await;
    let server = test_server(&upstream, GatewayConfig::default());

    let response = server
        .post("/v1/chat")
        .json(&json!({
            "agentId": "kb-bot",
            "messages": [{"role": "user", "content": "hello"}],
            "stream": true,
            "sessionId": "chat-1"
        }))
        .await;

    response.assert_status_ok();
    let text = response.text();
    let session = text.find("event: session-id").expect("session frame");
    let first = text.find("data: {\"text\":\"hi\"}").expect("first delta");
    let done = text.find("event: done").expect("done frame");
    assert!(session < first && first < done);
    assert!(!text.contains("event: error"));
}

#[tokio::test]
async fn test_unknown_agent_is_400() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream, GatewayConfig::default());

    let response = server
        .post("/v1/chat")
        .json(&json!({"agentId": "nobody", "messages": [{"role": "user", "content": "hello"}]}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["kind"], "config_error");
}

#[tokio::test]
async fn test_rate_limited_caller_gets_retry_after() {
    let upstream = MockServer::start().await;
    mount_completion(&upstream, "ok").await;

    let mut config = GatewayConfig::default();
    config.reliability.rate_limit = RateLimitConfig {
        per_caller: BucketConfig { capacity: 1, refill_per_sec: 0.5 },
        ..RateLimitConfig::default()
    };
    let server = test_server(&upstream, config);
    let body = json!({"agentId": "kb-bot", "messages": [{"role": "user", "content": "hello"}]});

    let (name, value) = caller("u-1");
    server.post("/v1/chat").add_header(name.clone(), value.clone()).json(&body).await.assert_status_ok();

    let limited = server.post("/v1/chat").add_header(name, value).json(&body).await;
    limited.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.header("retry-after"), "2");
    assert_eq!(limited.json::<Value>()["error"]["kind"], "rate_limit_exceeded");

    let (name, value) = caller("u-2");
    server.post("/v1/chat").add_header(name, value).json(&body).await.assert_status_ok();
}

#[tokio::test]
async fn test_conversation_listing() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/core/chat/getHistories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": {
                "list": [
                    {"chatId": "chat-1", "title": "hello", "updateTime": "2026-03-01T10:00:00Z"},
                    {"chatId": "chat-2", "title": "pricing", "customTitle": "Pricing", "updateTime": "2026-03-02T10:00:00Z"}
                ],
                "total": 5
            }
        })))
        .expect(1)
        .mount(&upstream)
        .await;
    let server = test_server(&upstream, GatewayConfig::default());

    let response = server.get("/v1/agents/kb-bot/conversations").add_query_param("limit", 2).await;
    response.assert_status_ok();
    let page = response.json::<Value>();
    assert_eq!(page["conversations"].as_array().map(Vec::len), Some(2));
    assert_eq!(page["conversations"][1]["title"], "Pricing");
    assert_eq!(page["has_more"], true);
    assert_eq!(page["next_cursor"], "2");
}

#[tokio::test]
async fn test_history_on_plain_chat_agent_is_501() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream, GatewayConfig::default());

    let response = server.get("/v1/agents/gpt/conversations").await;
    response.assert_status(StatusCode::NOT_IMPLEMENTED);
    assert_eq!(response.json::<Value>()["error"]["kind"], "unsupported_operation");
}

#[tokio::test]
async fn test_missing_conversation_is_404() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/core/chat/getPaginationRecords"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 500, "statusText": "chat not exist", "data": null
        })))
        .mount(&upstream)
        .await;
    let server = test_server(&upstream, GatewayConfig::default());

    let response = server.get("/v1/agents/kb-bot/conversations/gone").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["kind"], "session_not_found");
}

#[tokio::test]
async fn test_delete_and_feedback() {
    let upstream = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/core/chat/delHistory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "data": null})))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/core/chat/feedback/updateUserFeedback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "data": null})))
        .expect(1)
        .mount(&upstream)
        .await;
    let server = test_server(&upstream, GatewayConfig::default());

    server.delete("/v1/agents/kb-bot/conversations/chat-1").await.assert_status(StatusCode::NO_CONTENT);
    server
        .post("/v1/agents/kb-bot/conversations/chat-1/messages/m-2/feedback")
        .json(&json!({"rating": "dislike", "comment": "wrong answer"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_circuit_status() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream, GatewayConfig::default());

    let response = server.get("/api/resilience/circuits").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["summary"]["open"], 0);
    assert!(body["circuits"].as_array().is_some_and(Vec::is_empty));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream, GatewayConfig::default());

    let response = server.get("/metrics").await;
    response.assert_status_ok();
    assert!(response.header("content-type").to_str().is_ok_and(|v| v.starts_with("text/plain")));
}
