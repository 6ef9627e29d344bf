//! Line-delimited event framing (`event:` / `data:` lines, blank line ends a frame).

use bytes::BytesMut;
use relaygate_types::ProxyError;

/// Parse a single SSE line into (key, value) pair.
///
/// SSE format: `key: value\n`
pub fn parse_sse_line(line: &str) -> Option<(String, String)> {
    let colon_pos = line.find(':')?;
    let key = &line[..colon_pos];
    let value = line[colon_pos + 1..].trim_start();
    Some((key.to_string(), value.to_string()))
}

/// One dispatched event: optional name plus the joined `data:` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    pub fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty()
    }
}

/// Incremental decoder fed with raw network chunks.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; bytes are buffered
/// until a newline arrives.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: BytesMut,
    pending: SseFrame,
    has_data: bool,
    max_frame_bytes: usize,
}

impl SseDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            pending: SseFrame::default(),
            has_data: false,
            max_frame_bytes,
        }
    }

    /// Feed bytes and collect every frame completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, ProxyError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_raw = self.buffer.split_to(pos + 1);
            let line = String::from_utf8_lossy(&line_raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.feed_line(line) {
                frames.push(frame);
            }
        }

        if self.buffer.len() + self.pending.data.len() > self.max_frame_bytes {
            return Err(ProxyError::StreamParse {
                message: format!("frame exceeds {} bytes without terminator", self.max_frame_bytes),
            });
        }
        Ok(frames)
    }

    /// Flush a trailing frame when the upstream closes without a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = String::from_utf8_lossy(&rest);
            if let Some(frame) = self.feed_line(line.trim_end_matches(['\n', '\r'])) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        // comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (key, value) = parse_sse_line(line)?;
        match key.as_str() {
            "event" => self.pending.event = Some(value),
            "data" => {
                if self.has_data {
                    self.pending.data.push('\n');
                }
                self.pending.data.push_str(&value);
                self.has_data = true;
            },
            _ => {},
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let frame = std::mem::take(&mut self.pending);
        self.has_data = false;
        if frame.is_empty() {
            None
        } else {
            Some(frame)
        }
    }
}
