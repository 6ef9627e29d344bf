//! Gateway configuration: agents plus reliability, cache and stream tuning.
//!
//! Every section carries serde defaults so a config file only needs `agents`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

use super::agent::AgentConfig;

/// One token bucket dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Validate)]
pub struct BucketConfig {
    /// Burst size
    #[validate(range(min = 1_u32))]
    pub capacity: u32,
    /// Tokens added per second
    #[validate(range(min = 0.0_f64))]
    pub refill_per_sec: f64,
}

/// Multi-dimension rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
pub struct RateLimitConfig {
    #[validate(nested)]
    pub per_agent: BucketConfig,
    #[validate(nested)]
    pub per_caller: BucketConfig,
    /// Buckets untouched for this long are evicted
    pub idle_timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_agent: BucketConfig { capacity: 120, refill_per_sec: 2.0 },
            per_caller: BucketConfig { capacity: 20, refill_per_sec: 0.5 },
            idle_timeout_ms: 10 * 60 * 1000,
        }
    }
}

impl RateLimitConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures inside the window before opening the circuit
    #[validate(range(min = 1_u32))]
    pub failure_threshold: u32,
    /// Sliding window for counting failures
    pub window_ms: u64,
    /// How long the circuit stays open before admitting a trial call
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, window_ms: 60_000, cooldown_ms: 30_000 }
    }
}

impl CircuitBreakerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[validate(range(min = 1_u32, max = 10_u32))]
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    #[validate(range(min = 1.0_f64))]
    pub multiplier: f64,
    /// Fraction of the delay randomized, 0.0 disables jitter
    #[validate(range(min = 0.0_f64, max = 1.0_f64))]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
pub struct ReliabilityConfig {
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    #[validate(nested)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[validate(nested)]
    pub retry: RetryConfig,
}

/// Adaptive-TTL cache for session lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_ttl_bounds"))]
pub struct CacheConfig {
    pub min_ttl_ms: u64,
    pub max_ttl_ms: u64,
    /// Window in which repeated requests mark a key as hot
    pub hot_window_ms: u64,
    /// Requests inside the window at which TTL bottoms out at `min_ttl_ms`
    #[validate(range(min = 1_u32))]
    pub hot_threshold: u32,
    #[validate(range(min = 1_usize))]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_ttl_ms: 2_000,
            max_ttl_ms: 60_000,
            hot_window_ms: 30_000,
            hot_threshold: 6,
            max_entries: 2_000,
        }
    }
}

fn validate_ttl_bounds(cfg: &CacheConfig) -> Result<(), ValidationError> {
    if cfg.min_ttl_ms > cfg.max_ttl_ms {
        return Err(ValidationError::new("min_ttl_ms_exceeds_max_ttl_ms"));
    }
    Ok(())
}

/// Stream translation limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct StreamConfig {
    /// Consecutive undecodable chunks before the stream is failed
    #[validate(range(min = 1_u32))]
    pub max_consecutive_parse_failures: u32,
    /// Longest silence tolerated between upstream chunks
    pub chunk_idle_timeout_ms: u64,
    /// Upper bound on one buffered, unterminated frame
    #[validate(range(min = 1024_usize))]
    pub max_frame_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_consecutive_parse_failures: 5,
            chunk_idle_timeout_ms: 60_000,
            max_frame_bytes: 4 * 1024 * 1024,
        }
    }
}

impl StreamConfig {
    pub fn chunk_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_idle_timeout_ms)
    }
}

fn default_request_timeout_ms() -> u64 {
    120_000
}

/// Top-level gateway configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct GatewayConfig {
    #[validate(nested)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    #[validate(nested)]
    pub reliability: ReliabilityConfig,
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheConfig,
    #[serde(default)]
    #[validate(nested)]
    pub stream: StreamConfig,
    /// Per-call upstream deadline
    #[serde(default = "default_request_timeout_ms")]
    #[validate(range(min = 100_u64))]
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            reliability: ReliabilityConfig::default(),
            cache: CacheConfig::default(),
            stream: StreamConfig::default(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
