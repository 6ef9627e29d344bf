//! Proxy subsystem: adapters, transport, reliability and stream translation.

pub mod cache;
pub mod chat;
pub mod common;
pub mod prometheus;
pub mod providers;
pub mod rate_limit;
pub mod reliability;
pub mod retry;
pub mod session_gateway;
pub mod streaming;
pub mod upstream;

pub use cache::CacheLayer;
pub use chat::{ChatOutcome, ChatProxyCore};
pub use common::circuit_breaker::{
    CircuitBreakerManager, CircuitBreakerSummary, CircuitPermit, CircuitSnapshot, CircuitState,
};
pub use providers::{ProviderAdapter, ProviderRegistry, ProviderRequest};
pub use rate_limit::RateLimiter;
pub use reliability::ReliabilityLayer;
pub use retry::RetryPolicy;
pub use session_gateway::SessionGateway;
pub use streaming::{EventStream, StreamTranslator};
pub use upstream::UpstreamClient;
