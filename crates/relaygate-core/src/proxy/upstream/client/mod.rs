mod request_executor;

#[cfg(test)]
mod tests;

use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use relaygate_types::{ProviderKind, ProxyError, ProxyResult};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;

use crate::proxy::providers::ProviderRequest;
pub use request_executor::{build_url, extract_error_message, parse_retry_after};

/// Raw upstream byte stream with transport errors already classified.
pub type ByteStream = Pin<Box<dyn Stream<Item = ProxyResult<Bytes>> + Send>>;

/// Build the shared HTTP client.
pub fn build_http_client(connect_timeout: Duration) -> ProxyResult<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .tcp_nodelay(true)
        .http2_keep_alive_interval(Duration::from_secs(25))
        .build()
        .map_err(|e| ProxyError::config(format!("Failed to build HTTP client: {e}")))
}

/// Executes [`ProviderRequest`]s with a per-call deadline.
///
/// Non-2xx answers become [`ProxyError::ProviderHttp`]; connection failures
/// become `Transport` or `Timeout`. No retries happen here.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http_client: Client,
    request_timeout: Duration,
}

impl UpstreamClient {
    /// Accepts a pre-built `reqwest::Client` so connection pools are shared.
    pub fn new(http_client: Client, request_timeout: Duration) -> Self {
        Self { http_client, request_timeout }
    }

    pub fn from_timeout(request_timeout: Duration) -> ProxyResult<Self> {
        Ok(Self::new(build_http_client(Duration::from_secs(10))?, request_timeout))
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Send and wait for response headers. Used for streaming calls: the
    /// deadline covers the connection phase only.
    pub async fn send(
        &self,
        provider: ProviderKind,
        request: &ProviderRequest,
        headers: &HeaderMap,
    ) -> ProxyResult<Response> {
        let call = request_executor::execute(&self.http_client, provider, request, headers);
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| self.timeout_error(provider))?
    }

    /// Send and decode the whole JSON body inside the deadline.
    /// An empty body decodes to `Value::Null`.
    pub async fn send_json(
        &self,
        provider: ProviderKind,
        request: &ProviderRequest,
        headers: &HeaderMap,
    ) -> ProxyResult<Value> {
        let call = async {
            let response =
                request_executor::execute(&self.http_client, provider, request, headers).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| request_executor::classify_transport_error(provider, &e))?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            serde_json::from_slice(&bytes).map_err(|e| {
                ProxyError::invalid_response(provider.as_str(), format!("body is not JSON: {e}"))
            })
        };

        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| self.timeout_error(provider))?
    }

    /// Turn a successful streaming response into a classified byte stream.
    pub fn byte_stream(provider: ProviderKind, response: Response) -> ByteStream {
        response
            .bytes_stream()
            .map_err(move |e| request_executor::classify_transport_error(provider, &e))
            .boxed()
    }

    fn timeout_error(&self, provider: ProviderKind) -> ProxyError {
        ProxyError::Timeout {
            provider: provider.to_string(),
            duration_ms: u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
            attempts: 1,
        }
    }
}
