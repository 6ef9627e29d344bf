//! Proxy-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while proxying a chat or session call.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ProxyError {
    /// Agent configuration is missing a field or carries a malformed one
    #[error("Invalid agent configuration: {message}")]
    Config { message: String },

    /// Upstream answered with a non-success HTTP status
    #[error("Upstream {provider} returned HTTP {status}: {message} (attempts: {attempts})")]
    ProviderHttp {
        provider: String,
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
        attempts: u32,
    },

    /// Connection could not be established or was reset
    #[error("Transport error talking to {provider}: {message} (attempts: {attempts})")]
    Transport { provider: String, message: String, attempts: u32 },

    /// Per-call deadline elapsed
    #[error("Upstream {provider} timed out after {duration_ms}ms (attempts: {attempts})")]
    Timeout { provider: String, duration_ms: u64, attempts: u32 },

    /// A stream chunk could not be decoded
    #[error("Malformed stream chunk: {message}")]
    StreamParse { message: String },

    /// Local rate-limit policy rejected the call
    #[error("Rate limit exceeded for {scope}, retry after {retry_after_ms}ms")]
    RateLimitExceeded { scope: String, retry_after_ms: u64 },

    /// Circuit breaker is open for this agent
    #[error("Circuit open for agent {agent_id}, retry after {retry_after_ms}ms")]
    CircuitOpen { agent_id: String, retry_after_ms: u64 },

    /// Upstream reports the conversation or message does not exist
    #[error("Session not found: {resource}")]
    SessionNotFound { resource: String },

    /// Provider has no such capability
    #[error("Provider {provider} does not support {operation}")]
    UnsupportedOperation { provider: String, operation: String },

    /// Upstream body could not be interpreted
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },
}

impl ProxyError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn unsupported(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation { provider: provider.into(), operation: operation.into() }
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse { provider: provider.into(), message: message.into() }
    }

    /// Timeouts, transport failures, 429 and 5xx may succeed on another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::ProviderHttp { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Only upstream unavailability counts against the circuit; a rejected
    /// request (4xx other than 429) says nothing about upstream health.
    pub fn counts_as_circuit_failure(&self) -> bool {
        self.is_retryable()
    }

    /// Annotate the retryable variants with the number of attempts made.
    #[must_use]
    pub fn with_attempts(mut self, count: u32) -> Self {
        match &mut self {
            Self::ProviderHttp { attempts, .. }
            | Self::Transport { attempts, .. }
            | Self::Timeout { attempts, .. } => *attempts = count,
            _ => {},
        }
        self
    }

    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::ProviderHttp { attempts, .. }
            | Self::Transport { attempts, .. }
            | Self::Timeout { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Short machine-readable kind, used in `error` stream events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config_error",
            Self::ProviderHttp { .. } => "provider_http_error",
            Self::Transport { .. } => "transport_error",
            Self::Timeout { .. } => "timeout",
            Self::StreamParse { .. } => "stream_parse_error",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }

    /// Retry hint surfaced to callers as `Retry-After`.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded { retry_after_ms, .. }
            | Self::CircuitOpen { retry_after_ms, .. } => Some(*retry_after_ms),
            Self::ProviderHttp { retry_after_secs: Some(secs), .. } => {
                Some(secs.saturating_mul(1000))
            },
            _ => None,
        }
    }

    /// Get HTTP status code for this error at the gateway boundary.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Config { .. } => 400,
            Self::RateLimitExceeded { .. } => 429,
            Self::CircuitOpen { .. } => 503,
            Self::SessionNotFound { .. } => 404,
            Self::UnsupportedOperation { .. } => 501,
            Self::Timeout { .. } => 504,
            Self::ProviderHttp { .. }
            | Self::Transport { .. }
            | Self::StreamParse { .. }
            | Self::InvalidResponse { .. } => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> ProxyError {
        ProxyError::ProviderHttp {
            provider: "agent-platform".to_string(),
            status,
            message: "boom".to_string(),
            retry_after_secs: None,
            attempts: 1,
        }
    }

    #[test]
    fn test_retry_classification() {
        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
        assert!(http(429).is_retryable());
        assert!(!http(400).is_retryable());
        assert!(!http(401).is_retryable());
        assert!(!http(404).is_retryable());
        assert!(ProxyError::Timeout {
            provider: "generic-chat-a".to_string(),
            duration_ms: 10,
            attempts: 1
        }
        .is_retryable());
        assert!(!ProxyError::config("missing app id").is_retryable());
    }

    #[test]
    fn test_client_errors_do_not_trip_circuit() {
        assert!(!http(422).counts_as_circuit_failure());
        assert!(http(429).counts_as_circuit_failure());
        assert!(http(502).counts_as_circuit_failure());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(ProxyError::config("bad").http_status_code(), 400);
        assert_eq!(
            ProxyError::RateLimitExceeded { scope: "caller:u1".to_string(), retry_after_ms: 10 }
                .http_status_code(),
            429
        );
        assert_eq!(
            ProxyError::CircuitOpen { agent_id: "a".to_string(), retry_after_ms: 10 }
                .http_status_code(),
            503
        );
        assert_eq!(
            ProxyError::SessionNotFound { resource: "c1".to_string() }.http_status_code(),
            404
        );
        assert_eq!(http(500).http_status_code(), 502);
    }

    #[test]
    fn test_with_attempts_only_touches_upstream_variants() {
        let annotated = http(500).with_attempts(3);
        assert_eq!(annotated.attempts(), Some(3));
        assert!(annotated.to_string().contains("attempts: 3"));

        let untouched = ProxyError::config("x").with_attempts(3);
        assert_eq!(untouched.attempts(), None);
    }
}
