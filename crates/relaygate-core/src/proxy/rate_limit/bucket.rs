use relaygate_types::models::BucketConfig;
use std::time::{Duration, Instant};

/// Classic token bucket, refilled lazily on access.
#[derive(Debug, Clone)]
pub(crate) struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
    pub last_used: Instant,
}

impl TokenBucket {
    pub fn new(config: BucketConfig, now: Instant) -> Self {
        let capacity = f64::from(config.capacity);
        Self {
            capacity,
            refill_per_sec: config.refill_per_sec,
            tokens: capacity,
            last_refill: now,
            last_used: now,
        }
    }

    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    pub fn has_token(&self) -> bool {
        self.tokens >= 1.0
    }

    pub fn consume(&mut self, now: Instant) {
        self.tokens -= 1.0;
        self.last_used = now;
    }

    /// Time until one whole token is available. `None` when the bucket never refills.
    pub fn time_until_token(&self) -> Option<Duration> {
        if self.has_token() {
            return Some(Duration::ZERO);
        }
        if self.refill_per_sec <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_sec))
    }

    #[cfg(test)]
    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}
