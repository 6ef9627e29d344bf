use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use relaygate_types::protocol::ErrorBody;
use relaygate_types::ProxyError;
use tracing::warn;

/// `ProxyError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ProxyError);

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        Self(err)
    }
}

/// Whole seconds, rounded up, for the `Retry-After` header.
fn retry_after_secs(retry_after_ms: u64) -> u64 {
    retry_after_ms.div_ceil(1000).max(1)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        if status.is_server_error() {
            warn!("Request failed with {}: {}", status, self.0);
        }

        let mut response = (status, Json(ErrorBody::from(&self.0))).into_response();
        if let Some(ms) = self.0.retry_after_ms() {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs(ms).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_response_has_retry_after() {
        let err = ProxyError::RateLimitExceeded { scope: "caller:u-1".to_string(), retry_after_ms: 1_200 };
        let response = ApiError(err).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()), Some("2"));
    }

    #[test]
    fn test_unsupported_operation_is_501() {
        let response = ApiError(ProxyError::unsupported("generic-chat-a", "initialize")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(1), 1);
        assert_eq!(retry_after_secs(1_000), 1);
        assert_eq!(retry_after_secs(1_001), 2);
    }
}
