//! Chat entry point: adapter selection, fast-fail validation, reliable
//! execution and stream translation.

use futures::StreamExt;
use relaygate_types::{
    AgentConfig, ChatMessage, ChatOptions, ProxyError, ProxyResult, StreamConfig, StreamEvent,
    UnifiedChatResponse,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::proxy::prometheus;
use crate::proxy::providers::{ProviderAdapter, ProviderRegistry};
use crate::proxy::reliability::ReliabilityLayer;
use crate::proxy::streaming::{EventStream, StreamTranslator};
use crate::proxy::upstream::UpstreamClient;

/// Result of [`ChatProxyCore::send`].
pub enum ChatOutcome {
    Complete(UnifiedChatResponse),
    Stream(EventStream),
}

impl std::fmt::Debug for ChatOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(response) => f.debug_tuple("Complete").field(response).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Events a complete response would have produced as a stream.
fn response_events(response: UnifiedChatResponse) -> Vec<StreamEvent> {
    let mut events = Vec::with_capacity(5);
    if let Some(session_id) = response.session_id {
        events.push(StreamEvent::session(session_id));
    }
    if let Some(reasoning) = response.reasoning {
        events.push(StreamEvent::reasoning(reasoning));
    }
    if !response.content.is_empty() {
        events.push(StreamEvent::answer(response.content));
    }
    if let Some(usage) = response.usage {
        events.push(StreamEvent::Usage { usage });
    }
    events.push(StreamEvent::Done);
    events
}

fn new_trace_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[derive(Clone)]
pub struct ChatProxyCore {
    registry: Arc<ProviderRegistry>,
    reliability: Arc<ReliabilityLayer>,
    upstream: Arc<UpstreamClient>,
    stream_config: StreamConfig,
}

impl ChatProxyCore {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        reliability: Arc<ReliabilityLayer>,
        upstream: Arc<UpstreamClient>,
        stream_config: StreamConfig,
    ) -> Self {
        Self { registry, reliability, upstream, stream_config }
    }

    pub fn reliability(&self) -> &Arc<ReliabilityLayer> {
        &self.reliability
    }

    fn adapter_for(&self, agent: &AgentConfig) -> ProxyResult<Arc<dyn ProviderAdapter>> {
        self.registry
            .get(agent.provider)
            .ok_or_else(|| ProxyError::config(format!("no adapter registered for provider {}", agent.provider)))
    }

    /// Send one chat turn.
    ///
    /// With `options.stream` set the outcome is a live [`EventStream`]. Agents
    /// that cannot stream are called once and their answer replayed as events.
    pub async fn send(
        &self,
        agent: &AgentConfig,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> ProxyResult<ChatOutcome> {
        let adapter = self.adapter_for(agent)?;
        adapter.check_config(agent)?;

        let trace_id = new_trace_id();
        let streaming = options.stream && agent.capabilities.supports_stream;
        let headers = adapter.build_headers(agent)?;
        let request = adapter.transform_request(messages, agent, streaming, options)?;
        let kind = adapter.kind();
        let caller_id = options.caller_id();

        info!(
            agent_id = %agent.id,
            provider = %kind,
            streaming,
            "[{}] Chat request: {} message(s) -> {} {}",
            trace_id,
            messages.len(),
            request.method,
            request.url
        );

        let started = Instant::now();
        let upstream = &self.upstream;
        let (request_ref, headers_ref) = (&request, &headers);

        if streaming {
            let connected = self
                .reliability
                .execute(&agent.id, caller_id, &trace_id, move || upstream.send(kind, request_ref, headers_ref))
                .await;
            prometheus::record_request(
                kind.as_str(),
                &agent.id,
                connected.as_ref().map_or_else(ProxyError::kind, |_| "ok"),
                started.elapsed(),
            );

            let response = connected?;
            debug!("[{}] Upstream stream opened after {:?}", trace_id, started.elapsed());
            let translator = StreamTranslator::new(adapter, self.stream_config.clone(), trace_id);
            let events = translator.translate(UpstreamClient::byte_stream(kind, response), request.session_id.clone());
            return Ok(ChatOutcome::Stream(events));
        }

        let result = self
            .reliability
            .execute(&agent.id, caller_id, &trace_id, move || upstream.send_json(kind, request_ref, headers_ref))
            .await
            .and_then(|body| adapter.transform_response(body));
        prometheus::record_request(
            kind.as_str(),
            &agent.id,
            result.as_ref().map_or_else(ProxyError::kind, |_| "ok"),
            started.elapsed(),
        );

        let mut response = result?;
        if response.session_id.is_none() {
            response.session_id = request.session_id;
        }

        if options.stream {
            debug!("[{}] {} does not stream; replaying the complete answer", trace_id, agent.id);
            return Ok(ChatOutcome::Stream(futures::stream::iter(response_events(response)).boxed()));
        }
        Ok(ChatOutcome::Complete(response))
    }

    /// [`send`](Self::send) with every stream event handed to `on_event` as it
    /// arrives. Returns the complete response for non-streaming calls and
    /// `None` once a stream has ended.
    pub async fn send_with_callback<F>(
        &self,
        agent: &AgentConfig,
        messages: &[ChatMessage],
        options: &ChatOptions,
        mut on_event: F,
    ) -> ProxyResult<Option<UnifiedChatResponse>>
    where
        F: FnMut(StreamEvent) + Send,
    {
        match self.send(agent, messages, options).await? {
            ChatOutcome::Complete(response) => Ok(Some(response)),
            ChatOutcome::Stream(mut events) => {
                while let Some(event) = events.next().await {
                    on_event(event);
                }
                Ok(None)
            },
        }
    }
}
