pub mod circuit_breaker;
pub mod sse_parser;

pub use sse_parser::{parse_sse_line, SseDecoder, SseFrame};
