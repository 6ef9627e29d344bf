//! Multi-dimension token-bucket rate limiting.
//!
//! Every call is checked against a per-agent bucket and a per-(agent, caller)
//! bucket. Tokens are taken from both or from neither.

mod bucket;

#[cfg(test)]
mod tests;

use bucket::TokenBucket;
use parking_lot::Mutex;
use relaygate_types::{ProxyError, RateLimitConfig};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::proxy::prometheus;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum BucketKey {
    Agent(String),
    Caller { agent_id: String, caller_id: String },
}

impl BucketKey {
    fn scope(&self) -> String {
        match self {
            Self::Agent(agent_id) => format!("agent:{agent_id}"),
            Self::Caller { caller_id, .. } => format!("caller:{caller_id}"),
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    buckets: HashMap<BucketKey, TokenBucket>,
    last_sweep: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState { buckets: HashMap::new(), last_sweep: Instant::now() }),
        }
    }

    /// Take one token from both dimensions or fail with a retry-after hint.
    pub fn try_acquire(&self, agent_id: &str, caller_id: &str) -> Result<(), ProxyError> {
        self.try_acquire_at(agent_id, caller_id, Instant::now())
    }

    pub(crate) fn try_acquire_at(
        &self,
        agent_id: &str,
        caller_id: &str,
        now: Instant,
    ) -> Result<(), ProxyError> {
        let agent_key = BucketKey::Agent(agent_id.to_string());
        let caller_key =
            BucketKey::Caller { agent_id: agent_id.to_string(), caller_id: caller_id.to_string() };

        let mut state = self.state.lock();
        if now.saturating_duration_since(state.last_sweep) >= self.sweep_interval() {
            Self::sweep(&mut state.buckets, now, self.config.idle_timeout());
            state.last_sweep = now;
        }

        let mut blocked: Option<(BucketKey, Duration)> = None;
        for (key, config) in
            [(&agent_key, self.config.per_agent), (&caller_key, self.config.per_caller)]
        {
            let bucket = state
                .buckets
                .entry(key.clone())
                .or_insert_with(|| TokenBucket::new(config, now));
            bucket.refill(now);
            if !bucket.has_token() {
                let wait = bucket.time_until_token().unwrap_or(self.config.idle_timeout());
                if blocked.as_ref().map_or(true, |(_, current)| wait > *current) {
                    blocked = Some((key.clone(), wait));
                }
            }
        }

        if let Some((key, wait)) = blocked {
            drop(state);
            let scope = key.scope();
            warn!(agent_id = %agent_id, caller_id = %caller_id, scope = %scope, "Rate limit exceeded");
            let dimension = if matches!(key, BucketKey::Agent(_)) { "agent" } else { "caller" };
            prometheus::record_rate_limited(agent_id, dimension);
            let retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX).max(1);
            return Err(ProxyError::RateLimitExceeded { scope, retry_after_ms });
        }

        for key in [&agent_key, &caller_key] {
            if let Some(bucket) = state.buckets.get_mut(key) {
                bucket.consume(now);
            }
        }
        Ok(())
    }

    fn sweep_interval(&self) -> Duration {
        (self.config.idle_timeout() / 2).max(Duration::from_secs(1))
    }

    fn sweep(buckets: &mut HashMap<BucketKey, TokenBucket>, now: Instant, idle: Duration) {
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_used) < idle);
        let evicted = before - buckets.len();
        if evicted > 0 {
            debug!(evicted, remaining = buckets.len(), "Evicted idle rate-limit buckets");
        }
    }

    /// Evict idle buckets now instead of waiting for the next call.
    pub fn sweep_idle(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let before = state.buckets.len();
        Self::sweep(&mut state.buckets, now, self.config.idle_timeout());
        state.last_sweep = now;
        before - state.buckets.len()
    }

    pub fn tracked_buckets(&self) -> usize {
        self.state.lock().buckets.len()
    }
}
