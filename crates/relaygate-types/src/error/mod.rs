//! Typed error definitions for relaygate.
//!
//! - **Serializable** so they can travel inside `error` stream events
//! - **Clone** so a single-flight result can be shared by every waiter
//! - **Matchable** for retry and circuit-breaker classification

mod config;
mod proxy;

pub use config::ConfigError;
pub use proxy::ProxyError;

/// Standard Result type for proxy operations.
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;
