use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Response};
use relaygate_types::{ProviderKind, ProxyError, ProxyResult};
use serde_json::Value;

use crate::proxy::prometheus::status_category;
use crate::proxy::providers::ProviderRequest;

const MAX_ERROR_MESSAGE_CHARS: usize = 512;

/// Join a base URL and a path, tolerating slashes on either side.
pub fn build_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// `Retry-After` as delta-seconds. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers.get(header::RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()
}

/// Pull a human-readable message out of an upstream error body.
///
/// Understands `{"error":{"message"}}`, `{"error":"..."}` and `{"message"}`;
/// anything else is returned as (truncated) text.
pub fn extract_error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        json.pointer("/error/message")
            .or_else(|| json.get("error").filter(|e| e.is_string()))
            .or_else(|| json.get("message"))
            .or_else(|| json.get("statusText"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect::<String>() + "..."
    } else {
        message
    }
}

pub(super) fn classify_transport_error(provider: ProviderKind, err: &reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::Timeout { provider: provider.to_string(), duration_ms: 0, attempts: 1 }
    } else {
        ProxyError::Transport { provider: provider.to_string(), message: err.to_string(), attempts: 1 }
    }
}

pub(super) async fn execute(
    client: &Client,
    provider: ProviderKind,
    request: &ProviderRequest,
    headers: &HeaderMap,
) -> ProxyResult<Response> {
    let mut builder = client.request(request.method.clone(), &request.url).headers(headers.clone());
    if !request.query.is_empty() {
        builder = builder.query(&request.query);
    }
    if let Some(body) = &request.body {
        builder = builder.json(body);
    }

    let response = builder.send().await.map_err(|e| {
        tracing::warn!("HTTP request to {} failed: {}", request.url, e);
        classify_transport_error(provider, &e)
    })?;

    let status = response.status();
    if status.is_success() {
        tracing::debug!("Upstream request succeeded | {} {} | Status: {}", request.method, request.url, status);
        return Ok(response);
    }

    let retry_after_secs = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(
        provider = %provider,
        status = status.as_u16(),
        class = status_category(status.as_u16()),
        "Upstream returned error status for {} {}",
        request.method,
        request.url
    );

    Err(ProxyError::ProviderHttp {
        provider: provider.to_string(),
        status: status.as_u16(),
        message: extract_error_message(&body),
        retry_after_secs,
        attempts: 1,
    })
}
