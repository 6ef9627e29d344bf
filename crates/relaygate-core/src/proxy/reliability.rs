//! Composition of rate limiting, circuit breaking and retry around one
//! upstream call.
//!
//! Order per call: rate limit (once), then for every attempt the circuit gate,
//! the call itself, and outcome bookkeeping. Rejections by the limiter or an
//! open circuit never reach the network.

use relaygate_types::{ProxyError, ProxyResult, ReliabilityConfig};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::proxy::common::circuit_breaker::{CircuitBreakerManager, CircuitBreakerSummary, CircuitSnapshot};
use crate::proxy::rate_limit::RateLimiter;
use crate::proxy::retry::RetryPolicy;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[derive(Debug)]
pub struct ReliabilityLayer {
    limiter: RateLimiter,
    breaker: CircuitBreakerManager,
    retry: RetryPolicy,
}

impl Default for ReliabilityLayer {
    fn default() -> Self {
        Self::from_config(&ReliabilityConfig::default())
    }
}

impl ReliabilityLayer {
    pub fn new(limiter: RateLimiter, breaker: CircuitBreakerManager, retry: RetryPolicy) -> Self {
        Self { limiter, breaker, retry }
    }

    pub fn from_config(config: &ReliabilityConfig) -> Self {
        Self::new(
            RateLimiter::new(config.rate_limit.clone()),
            CircuitBreakerManager::new(config.circuit_breaker.clone()),
            RetryPolicy::new(config.retry.clone()),
        )
    }

    pub fn breaker(&self) -> &CircuitBreakerManager {
        &self.breaker
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn circuit_summary(&self) -> CircuitBreakerSummary {
        self.breaker.get_summary()
    }

    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        self.breaker.snapshots()
    }

    /// Drop limiter buckets that have been idle past the configured timeout.
    pub fn sweep_idle(&self) -> usize {
        self.limiter.sweep_idle()
    }

    /// Run `call` under the full reliability policy.
    ///
    /// `call` is invoked once per attempt. Errors are annotated with the
    /// number of attempts made.
    pub async fn execute<T, F, Fut>(
        &self,
        agent_id: &str,
        caller_id: &str,
        trace_id: &str,
        mut call: F,
    ) -> ProxyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProxyResult<T>>,
    {
        self.limiter.try_acquire(agent_id, caller_id)?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            // Held across the call; if this future is dropped mid-call the
            // permit releases a half-open trial slot.
            let permit = self.breaker.acquire(agent_id).map_err(|retry_after| {
                debug!("[{}] Circuit for {} rejects attempt {}", trace_id, agent_id, attempt);
                ProxyError::CircuitOpen { agent_id: agent_id.to_string(), retry_after_ms: millis(retry_after) }
            })?;

            let err = match call().await {
                Ok(value) => {
                    permit.success();
                    return Ok(value);
                },
                Err(err) => err,
            };

            if err.counts_as_circuit_failure() {
                permit.failure(&err.to_string());
            } else {
                permit.neutral();
            }

            if !self.retry.should_retry(&err, attempt) {
                if attempt > 1 {
                    warn!("[{}] {} failed after {} attempts: {}", trace_id, agent_id, attempt, err);
                }
                return Err(err.with_attempts(attempt));
            }
            self.retry.backoff(attempt, &err, agent_id, trace_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_types::models::BucketConfig;
    use relaygate_types::{CircuitBreakerConfig, RateLimitConfig, RetryConfig};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn layer(max_attempts: u32, failure_threshold: u32) -> ReliabilityLayer {
        ReliabilityLayer::from_config(&ReliabilityConfig {
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerConfig { failure_threshold, window_ms: 60_000, cooldown_ms: 60_000 },
            retry: RetryConfig { max_attempts, base_delay_ms: 1, max_delay_ms: 5, multiplier: 2.0, jitter: 0.0 },
        })
    }

    fn server_error() -> ProxyError {
        ProxyError::ProviderHttp {
            provider: "workflow-platform".to_string(),
            status: 500,
            message: "internal".to_string(),
            retry_after_secs: None,
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let layer = layer(3, 10);
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = layer
            .execute("agent-a", "u-1", "t", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(server_error())
                } else {
                    Ok("hi there")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "hi there");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(layer.breaker().get_state("agent-a"), crate::proxy::CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded_and_reported() {
        let layer = layer(3, 10);
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = layer
            .execute("agent-a", "u-1", "t", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(server_error())
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts(), Some(3));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried_or_counted() {
        let layer = layer(3, 1);
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = layer
            .execute("agent-a", "u-1", "t", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProxyError::ProviderHttp {
                    provider: "agent-platform".to_string(),
                    status: 400,
                    message: "bad input".to_string(),
                    retry_after_secs: None,
                    attempts: 1,
                })
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts(), Some(1));
        assert_eq!(layer.breaker().get_state("agent-a"), crate::proxy::CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast() {
        let layer = layer(1, 2);
        for _ in 0..2 {
            let _ = layer.execute("agent-a", "u-1", "t", || async { Err::<(), _>(server_error()) }).await;
        }

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = layer
            .execute("agent-a", "u-1", "t", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(err, ProxyError::CircuitOpen { retry_after_ms, .. } if retry_after_ms > 0));
        assert_eq!(layer.circuit_summary().open, 1);
    }

    #[tokio::test]
    async fn test_circuit_opening_mid_retry_stops_the_loop() {
        let layer = layer(5, 2);
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = layer
            .execute("agent-a", "u-1", "t", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(server_error())
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.kind(), "circuit_open");
    }

    #[tokio::test]
    async fn test_cancelled_trial_does_not_wedge_half_open() {
        let layer = ReliabilityLayer::from_config(&ReliabilityConfig {
            circuit_breaker: CircuitBreakerConfig { failure_threshold: 1, window_ms: 60_000, cooldown_ms: 50 },
            retry: RetryConfig { max_attempts: 1, ..RetryConfig::default() },
            ..ReliabilityConfig::default()
        });
        let _ = layer.execute("agent-a", "u-1", "t", || async { Err::<(), _>(server_error()) }).await;
        assert_eq!(layer.breaker().get_state("agent-a"), crate::proxy::CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            layer.execute("agent-a", "u-1", "t", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(layer.breaker().get_state("agent-a"), crate::proxy::CircuitState::HalfOpen);

        let recovered = layer.execute("agent-a", "u-1", "t", || async { Ok("up") }).await;
        assert_eq!(recovered.unwrap(), "up");
        assert_eq!(layer.breaker().get_state("agent-a"), crate::proxy::CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_before_calling() {
        let layer = ReliabilityLayer::from_config(&ReliabilityConfig {
            rate_limit: RateLimitConfig {
                per_caller: BucketConfig { capacity: 1, refill_per_sec: 0.001 },
                ..RateLimitConfig::default()
            },
            ..ReliabilityConfig::default()
        });
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let first = layer
            .execute("agent-a", "u-1", "t", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(first.is_ok());

        let err = layer
            .execute("agent-a", "u-1", "t", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "rate_limit_exceeded");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // other callers keep their own bucket
        assert!(layer.execute("agent-a", "u-2", "t", || async { Ok(()) }).await.is_ok());
    }
}
