//! Upstream byte stream -> unified [`StreamEvent`] sequence.
//!
//! Guarantees for every translated stream:
//! - a known session id is emitted before any answer text
//! - malformed chunks are skipped (and counted) until too many arrive in a row
//! - exactly one terminal event (`Done` or `Error`) ends the stream
//!
//! The upstream is read lazily from inside the returned stream, so dropping it
//! drops the connection.

mod translator;


use bytes::Bytes;
use futures::{Stream, StreamExt};
use relaygate_types::{ProxyResult, StreamConfig, StreamEvent};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::proxy::common::SseDecoder;
use crate::proxy::providers::ProviderAdapter;
use crate::proxy::upstream::client::ByteStream;
use translator::TranslationState;

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

enum NextChunk {
    Chunk(ProxyResult<Bytes>),
    Closed,
    Idle,
}

async fn next_chunk(upstream: &mut ByteStream, idle: Option<Duration>) -> NextChunk {
    let next = match idle {
        Some(limit) => match tokio::time::timeout(limit, upstream.next()).await {
            Ok(next) => next,
            Err(_) => return NextChunk::Idle,
        },
        None => upstream.next().await,
    };
    next.map_or(NextChunk::Closed, NextChunk::Chunk)
}

/// Drives one adapter over one upstream response.
pub struct StreamTranslator {
    adapter: Arc<dyn ProviderAdapter>,
    config: StreamConfig,
    trace_id: String,
}

impl StreamTranslator {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, config: StreamConfig, trace_id: impl Into<String>) -> Self {
        Self { adapter, config, trace_id: trace_id.into() }
    }

    pub fn translate(self, mut upstream: ByteStream, initial_session: Option<String>) -> EventStream {
        use async_stream::stream;

        // Zero disables the idle timeout.
        let idle = Some(self.config.chunk_idle_timeout()).filter(|d| !d.is_zero());
        let mut decoder = SseDecoder::new(self.config.max_frame_bytes);
        let mut state =
            TranslationState::new(self.adapter, self.config.max_consecutive_parse_failures, self.trace_id.clone());
        let trace_id = self.trace_id;

        Box::pin(stream! {
            for event in state.start(initial_session) {
                yield event;
            }

            while !state.is_finished() {
                match next_chunk(&mut upstream, idle).await {
                    NextChunk::Chunk(Ok(bytes)) => match decoder.push(&bytes) {
                        Ok(frames) => {
                            for frame in frames {
                                for event in state.on_frame(frame) {
                                    yield event;
                                }
                            }
                        },
                        Err(err) => {
                            yield state.fail(&err);
                        },
                    },
                    NextChunk::Chunk(Err(err)) => {
                        yield state.fail(&err);
                    },
                    NextChunk::Idle => {
                        yield state.idle_timeout(idle.unwrap_or_default());
                    },
                    NextChunk::Closed => {
                        if let Some(frame) = decoder.finish() {
                            for event in state.on_frame(frame) {
                                yield event;
                            }
                        }
                        break;
                    },
                }
            }

            if let Some(done) = state.finish() {
                yield done;
            }
            if state.skipped_chunks() > 0 {
                tracing::info!("[{}] Stream finished, {} malformed chunk(s) skipped", trace_id, state.skipped_chunks());
            }
        })
    }
}
