//! Continuous token bucket.
//!
//! Refill is computed lazily on each call rather than by a background ticker.

use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Rate and burst applied to every bucket created by a registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketLimits {
    /// Tokens added per second.
    pub refill_rate: f64,
    /// Maximum tokens held (burst size).
    pub capacity: f64,
}

impl BucketLimits {
    pub fn new(refill_rate: f64, capacity: u32) -> Self {
        Self {
            refill_rate,
            capacity: capacity as f64,
        }
    }
}

impl From<&RateLimitConfig> for BucketLimits {
    fn from(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }
}

/// A single client's token bucket.
///
/// Invariant: `0 <= tokens <= capacity` after every operation.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket.
    pub fn new(limits: BucketLimits, now: Instant) -> Self {
        Self {
            capacity: limits.capacity,
            refill_rate: limits.refill_rate,
            tokens: limits.capacity,
            last_refill: now,
        }
    }

    /// Try to take one token at `now`.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        // Clamped to zero if the clock appears to run backwards.
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = self.last_refill.max(now);
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }
}
