//! # Relaygate Core
//!
//! Chat-proxy and streaming-resilience subsystem of the relaygate gateway.
//!
//! ## Architecture
//!
//! ```text
//! relaygate-core/src/
//! ├── agents.rs             # Agent directory (config source collaborator)
//! └── proxy/
//!     ├── providers/        # One adapter per upstream family + registry
//!     ├── streaming/        # SSE frames -> unified StreamEvent sequence
//!     ├── common/           # SSE line parsing, circuit breaker
//!     ├── rate_limit/       # Multi-dimension token buckets
//!     ├── retry/            # Bounded exponential backoff with jitter
//!     ├── reliability.rs    # rate limit -> circuit -> retry composition
//!     ├── cache/            # Single-flight adaptive-TTL cache
//!     ├── upstream/         # reqwest transport with deadlines
//!     ├── chat.rs           # ChatProxyCore
//!     ├── session_gateway.rs
//!     └── prometheus.rs     # Metrics recorder + helpers
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "parking_lot guards are scoped to short in-memory mutations"
)]
#![allow(clippy::module_name_repetitions, reason = "Type names mirror their module for clarity")]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Some types intentionally don't implement Eq"
)]
// Test-only lints: allow panic!, unwrap, etc. in test code
#![cfg_attr(
    test,
    allow(clippy::panic, clippy::unwrap_used, clippy::float_cmp, clippy::assertions_on_result_states)
)]

pub mod agents;
pub mod proxy;

pub use agents::{AgentConfigSource, StaticAgentDirectory};
pub use proxy::{
    CacheLayer, ChatOutcome, ChatProxyCore, CircuitBreakerManager, CircuitState, EventStream,
    ProviderAdapter, ProviderRegistry, ProviderRequest, RateLimiter, ReliabilityLayer,
    RetryPolicy, SessionGateway, StreamTranslator, UpstreamClient,
};
