use super::*;
use reqwest::header::{HeaderValue, RETRY_AFTER};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_build_url() {
    assert_eq!(build_url("https://upstream/api/", "/v1/chat/completions"), "https://upstream/api/v1/chat/completions");
    assert_eq!(build_url("https://upstream/api", "conversations"), "https://upstream/api/conversations");
}

#[test]
fn test_parse_retry_after() {
    let mut headers = HeaderMap::new();
    assert_eq!(parse_retry_after(&headers), None);
    headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
    assert_eq!(parse_retry_after(&headers), Some(7));
    headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
    assert_eq!(parse_retry_after(&headers), None);
}

#[test]
fn test_extract_error_message() {
    assert_eq!(extract_error_message(r#"{"error":{"message":"bad key"}}"#), "bad key");
    assert_eq!(extract_error_message(r#"{"code":"not_found","message":"Conversation Not Exists."}"#), "Conversation Not Exists.");
    assert_eq!(extract_error_message("plain failure"), "plain failure");
    assert!(extract_error_message(&"x".repeat(2000)).ends_with("..."));
}

#[tokio::test]
async fn test_send_json_maps_status_and_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "3")
                .set_body_json(json!({"error": {"message": "slow down"}})),
        )
        .mount(&server)
        .await;

    let client = UpstreamClient::new(reqwest::Client::new(), Duration::from_secs(5));
    let request = ProviderRequest::post(build_url(&server.uri(), "chat/completions"), json!({}));
    let err = client
        .send_json(ProviderKind::OpenAiChat, &request, &HeaderMap::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProxyError::ProviderHttp {
            provider: "generic-chat-a".to_string(),
            status: 429,
            message: "slow down".to_string(),
            retry_after_secs: Some(3),
            attempts: 1,
        }
    );
}

#[tokio::test]
async fn test_send_json_passes_query_and_tolerates_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/core/chat/delHistory"))
        .and(query_param("chatId", "c-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = UpstreamClient::new(reqwest::Client::new(), Duration::from_secs(5));
    let request = ProviderRequest::delete(build_url(&server.uri(), "core/chat/delHistory"))
        .with_query("chatId", "c-1");
    let body = client
        .send_json(ProviderKind::WorkflowPlatform, &request, &HeaderMap::new())
        .await
        .unwrap();

    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_deadline_becomes_timeout_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = UpstreamClient::new(reqwest::Client::new(), Duration::from_millis(50));
    let request = ProviderRequest::get(build_url(&server.uri(), "conversations"));
    let err = client
        .send_json(ProviderKind::AgentPlatform, &request, &HeaderMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProxyError::Timeout { duration_ms: 50, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let client = UpstreamClient::new(reqwest::Client::new(), Duration::from_secs(2));
    let request = ProviderRequest::get("http://127.0.0.1:9/unreachable".to_string());
    let err = client
        .send_json(ProviderKind::AgentPlatform, &request, &HeaderMap::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "transport_error");
}
