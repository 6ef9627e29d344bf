//! Retry policy shared by every upstream call.
//!
//! Bounded exponential backoff with jitter; an upstream `Retry-After` hint
//! overrides the computed delay (still capped by `max_delay_ms`).

#[cfg(test)]
mod tests;

use rand::Rng;
use relaygate_types::{ProxyError, RetryConfig};
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::proxy::prometheus;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Whether another attempt should follow `attempt` (1-based) failing with `err`.
    pub fn should_retry(&self, err: &ProxyError, attempt: u32) -> bool {
        err.is_retryable() && attempt < self.max_attempts()
    }

    /// Delay before the attempt following `attempt`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let raw = self.config.base_delay_ms as f64 * self.config.multiplier.powi(exponent);
        Duration::from_millis(raw.min(self.config.max_delay_ms as f64) as u64)
    }

    /// Delay with jitter applied, or the upstream hint when one was given.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let cap = Duration::from_millis(self.config.max_delay_ms);
        if let Some(hint) = retry_after {
            return hint.min(cap);
        }

        let base = self.base_delay(attempt);
        if self.config.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let spread = self.config.jitter.min(1.0);
        let factor = rand::thread_rng().gen_range((1.0 - spread)..=(1.0 + spread));
        base.mul_f64(factor).min(cap)
    }

    /// Sleep before the next attempt.
    pub async fn backoff(&self, attempt: u32, err: &ProxyError, agent_id: &str, trace_id: &str) {
        let hint = err.retry_after_ms().map(Duration::from_millis);
        let delay = self.delay_for(attempt, hint);
        info!(
            "[{}] Retrying {}: kind={}, attempt={}/{}, delay={}ms",
            trace_id,
            agent_id,
            err.kind(),
            attempt + 1,
            self.max_attempts(),
            delay.as_millis()
        );
        prometheus::record_retry(agent_id, err.kind());
        sleep(delay).await;
    }
}
