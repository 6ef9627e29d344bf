use relaygate_types::{ProxyError, StreamEvent, TokenUsage};
use std::sync::Arc;
use std::time::Duration;

use crate::proxy::common::SseFrame;
use crate::proxy::prometheus;
use crate::proxy::providers::{ProviderAdapter, StreamChunk};

/// Per-stream bookkeeping. Every method returns the events to emit, in order.
pub(super) struct TranslationState {
    adapter: Arc<dyn ProviderAdapter>,
    provider: &'static str,
    trace_id: String,
    announced_session: Option<String>,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
    skipped_chunks: u64,
    /// Last usage emitted, used to fill counts later chunks leave out
    usage: Option<TokenUsage>,
    finished: bool,
}

impl TranslationState {
    pub(super) fn new(adapter: Arc<dyn ProviderAdapter>, max_consecutive_failures: u32, trace_id: String) -> Self {
        let provider = adapter.kind().as_str();
        Self {
            adapter,
            provider,
            trace_id,
            announced_session: None,
            consecutive_failures: 0,
            max_consecutive_failures: max_consecutive_failures.max(1),
            skipped_chunks: 0,
            usage: None,
            finished: false,
        }
    }

    pub(super) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(super) fn skipped_chunks(&self) -> u64 {
        self.skipped_chunks
    }

    /// Session id known before the first byte (caller-supplied or generated).
    pub(super) fn start(&mut self, initial_session: Option<String>) -> Vec<StreamEvent> {
        initial_session.into_iter().filter_map(|id| self.announce(id)).collect()
    }

    fn announce(&mut self, session_id: String) -> Option<StreamEvent> {
        if session_id.is_empty() || self.announced_session.as_deref() == Some(session_id.as_str()) {
            return None;
        }
        self.announced_session = Some(session_id.clone());
        Some(StreamEvent::session(session_id))
    }

    pub(super) fn on_frame(&mut self, frame: SseFrame) -> Vec<StreamEvent> {
        if self.finished || frame.is_empty() {
            return Vec::new();
        }

        let chunk = match StreamChunk::from_frame(frame) {
            Ok(chunk) => chunk,
            Err(err) => return self.skip(&err),
        };

        let mut events = Vec::new();
        if let Some(session_id) = self.adapter.stream_session_id(&chunk) {
            events.extend(self.announce(session_id));
        }
        if let Some(reasoning) = self.adapter.stream_reasoning(&chunk) {
            events.push(StreamEvent::reasoning(reasoning));
        }

        match self.adapter.transform_stream_response(&chunk) {
            Ok(Some(event)) => {
                self.consecutive_failures = 0;
                self.finished = event.is_terminal();
                events.push(self.merge_usage(event));
            },
            Ok(None) => self.consecutive_failures = 0,
            Err(err @ ProxyError::StreamParse { .. }) => events.extend(self.skip(&err)),
            Err(err) => events.push(self.fail(&err)),
        }
        events
    }

    /// Some upstreams report prompt tokens once up front and only output
    /// counts afterwards; keep the earlier prompt count in that case.
    fn merge_usage(&mut self, event: StreamEvent) -> StreamEvent {
        let StreamEvent::Usage { usage } = event else {
            return event;
        };
        let merged = match self.usage {
            Some(seen) if usage.prompt_tokens == 0 => TokenUsage::new(seen.prompt_tokens, usage.completion_tokens),
            _ => usage,
        };
        self.usage = Some(merged);
        StreamEvent::Usage { usage: merged }
    }

    fn skip(&mut self, err: &ProxyError) -> Vec<StreamEvent> {
        self.consecutive_failures += 1;
        self.skipped_chunks += 1;
        prometheus::record_skipped_chunk(self.provider);
        tracing::warn!(
            "[{}] Skipping malformed {} chunk ({}/{}): {}",
            self.trace_id,
            self.provider,
            self.consecutive_failures,
            self.max_consecutive_failures,
            err
        );

        if self.consecutive_failures < self.max_consecutive_failures {
            return Vec::new();
        }
        let exhausted = ProxyError::StreamParse {
            message: format!("{} consecutive undecodable chunks from {}", self.consecutive_failures, self.provider),
        };
        vec![self.fail(&exhausted)]
    }

    /// Terminal error event; nothing is emitted afterwards.
    pub(super) fn fail(&mut self, err: &ProxyError) -> StreamEvent {
        tracing::error!("[{}] Stream from {} failed: {}", self.trace_id, self.provider, err);
        self.finished = true;
        StreamEvent::from(err)
    }

    pub(super) fn idle_timeout(&mut self, idle: Duration) -> StreamEvent {
        let err = ProxyError::Timeout {
            provider: self.provider.to_string(),
            duration_ms: u64::try_from(idle.as_millis()).unwrap_or(u64::MAX),
            attempts: 1,
        };
        self.fail(&err)
    }

    /// `Done` when the upstream closed without a terminal event of its own.
    pub(super) fn finish(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        tracing::debug!("[{}] {} stream closed without terminator, synthesizing done", self.trace_id, self.provider);
        Some(StreamEvent::Done)
    }
}
