//! Token bucket arithmetic shared by every store implementation.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Slack used when comparing fractional token counts, so that a request made
/// exactly at `last_rejection + retry_after` is not lost to float rounding.
pub const TOKEN_EPSILON: f64 = 1e-9;

/// Invalid bucket parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    #[error("refill rate must be greater than zero")]
    ZeroRefillRate,

    #[error("refill period must be greater than zero")]
    ZeroPeriod,
}

/// Immutable policy for one named limited operation.
///
/// A bucket holds up to `capacity` tokens and regains `refill_rate` tokens
/// every `period`, continuously rather than in discrete ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketConfig {
    capacity: u32,
    refill_rate: u32,
    period: Duration,
}

impl BucketConfig {
    pub fn new(capacity: u32, refill_rate: u32, period: Duration) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if refill_rate == 0 {
            return Err(ConfigError::ZeroRefillRate);
        }
        if period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }

        Ok(Self {
            capacity,
            refill_rate,
            period,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_rate(&self) -> u32 {
        self.refill_rate
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Tokens regained over `elapsed`.
    pub fn tokens_for(&self, elapsed: Duration) -> f64 {
        elapsed.as_secs_f64() * f64::from(self.refill_rate) / self.period.as_secs_f64()
    }

    /// Time until a bucket holding `tokens` can pay `cost`.
    ///
    /// Rounded up to the next millisecond, so the result is never zero when a
    /// wait is needed and a retry at exactly that offset succeeds.
    pub fn retry_after(&self, tokens: f64, cost: u32) -> Duration {
        let missing = f64::from(cost) - tokens;
        if missing <= TOKEN_EPSILON {
            return Duration::ZERO;
        }
        let secs = missing * self.period.as_secs_f64() / f64::from(self.refill_rate);
        Duration::from_millis((secs * 1000.0).ceil() as u64)
    }

    /// Time for an empty bucket to fill up completely. Saturates at `Duration::MAX`.
    pub fn full_refill_time(&self) -> Duration {
        let secs = self.period.as_secs_f64() * f64::from(self.capacity) / f64::from(self.refill_rate);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Admitted,
    Rejected { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateLimitDecision::Admitted)
    }

    /// Present only for rejections.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitDecision::Admitted => None,
            RateLimitDecision::Rejected { retry_after } => Some(*retry_after),
        }
    }
}

/// Mutable state of one `(operation, key)` bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    pub tokens: f64,
    pub last_refill_at: DateTime<Utc>,
}

impl BucketState {
    /// A fresh bucket starts full.
    pub fn full(config: &BucketConfig, now: DateTime<Utc>) -> Self {
        Self {
            tokens: f64::from(config.capacity),
            last_refill_at: now,
        }
    }

    /// Credit tokens accrued since the last refill, capped at capacity.
    ///
    /// A `now` earlier than `last_refill_at` credits nothing and leaves the
    /// timestamp where it was.
    pub fn refill(&mut self, config: &BucketConfig, now: DateTime<Utc>) {
        let Ok(elapsed) = (now - self.last_refill_at).to_std() else {
            return;
        };
        let capacity = f64::from(config.capacity);
        self.tokens = (self.tokens + config.tokens_for(elapsed)).min(capacity);
        self.last_refill_at = now;
    }

    /// Refill, then either pay `cost` or report how long until it can be paid.
    pub fn consume_or_reject(
        &mut self,
        config: &BucketConfig,
        cost: u32,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        self.refill(config, now);
        let decision = self.decide(config, cost);
        if decision.is_admitted() {
            self.tokens = (self.tokens - f64::from(cost)).max(0.0);
        }
        decision
    }

    /// Decision for `cost` against the current token count, without changing it.
    pub fn decide(&self, config: &BucketConfig, cost: u32) -> RateLimitDecision {
        if self.tokens + TOKEN_EPSILON >= f64::from(cost) {
            RateLimitDecision::Admitted
        } else {
            RateLimitDecision::Rejected {
                retry_after: config.retry_after(self.tokens, cost),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn send_message() -> BucketConfig {
        BucketConfig::new(3, 10, Duration::from_secs(60)).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn at(secs: f64) -> DateTime<Utc> {
        t0() + chrono::Duration::milliseconds((secs * 1000.0) as i64)
    }

    #[test]
    fn test_rejects_zero_parameters() {
        assert_eq!(
            BucketConfig::new(0, 1, Duration::from_secs(1)),
            Err(ConfigError::ZeroCapacity)
        );
        assert_eq!(
            BucketConfig::new(1, 0, Duration::from_secs(1)),
            Err(ConfigError::ZeroRefillRate)
        );
        assert_eq!(
            BucketConfig::new(1, 1, Duration::ZERO),
            Err(ConfigError::ZeroPeriod)
        );
    }

    #[test]
    fn test_burst_then_reject() {
        let config = send_message();
        let mut state = BucketState::full(&config, t0());

        for _ in 0..3 {
            assert!(state.consume_or_reject(&config, 1, t0()).is_admitted());
        }

        let decision = state.consume_or_reject(&config, 1, t0());
        assert_eq!(
            decision,
            RateLimitDecision::Rejected {
                retry_after: Duration::from_secs(6)
            }
        );
    }

    #[test]
    fn test_retry_after_is_sufficient() {
        let config = send_message();
        let mut state = BucketState::full(&config, t0());
        for _ in 0..3 {
            state.consume_or_reject(&config, 1, t0());
        }

        let retry_after = state
            .consume_or_reject(&config, 1, at(1.3))
            .retry_after()
            .unwrap();
        assert!(retry_after >= Duration::from_millis(4700));
        assert!(retry_after <= Duration::from_millis(4701));

        let retry_at = at(1.3) + chrono::Duration::from_std(retry_after).unwrap();
        assert!(state.consume_or_reject(&config, 1, retry_at).is_admitted());
    }

    #[test]
    fn test_rejection_keeps_partial_refill() {
        let config = send_message();
        let mut state = BucketState::full(&config, t0());
        for _ in 0..3 {
            state.consume_or_reject(&config, 1, t0());
        }

        state.consume_or_reject(&config, 1, at(3.0));
        assert!((state.tokens - 0.5).abs() < 1e-9);
        assert_eq!(state.last_refill_at, at(3.0));
    }

    #[test]
    fn test_refill_is_capped_at_capacity() {
        let config = send_message();
        let mut state = BucketState::full(&config, t0());
        state.consume_or_reject(&config, 1, t0());

        state.refill(&config, at(3600.0));
        assert_eq!(state.tokens, 3.0);
    }

    #[test]
    fn test_clock_going_backwards_never_drains() {
        let config = send_message();
        let mut state = BucketState::full(&config, at(10.0));
        state.consume_or_reject(&config, 1, at(10.0));

        state.refill(&config, at(5.0));
        assert_eq!(state.tokens, 2.0);
        assert_eq!(state.last_refill_at, at(10.0));
    }

    #[test]
    fn test_cost_larger_than_one() {
        let config = send_message();
        let mut state = BucketState::full(&config, t0());

        assert!(state.consume_or_reject(&config, 2, t0()).is_admitted());
        let decision = state.consume_or_reject(&config, 2, t0());
        assert_eq!(decision.retry_after(), Some(Duration::from_secs(6)));
    }

    #[test]
    fn test_full_refill_time() {
        assert_eq!(send_message().full_refill_time(), Duration::from_secs(18));
    }

    #[test]
    fn test_extreme_period_saturates() {
        let config = BucketConfig::new(3, 1, Duration::from_secs(u64::MAX)).unwrap();
        assert_eq!(config.full_refill_time(), Duration::MAX);

        let mut state = BucketState::full(&config, t0());
        assert!(state.consume_or_reject(&config, 3, t0()).is_admitted());
        let retry_after = state.consume_or_reject(&config, 1, at(1.0)).retry_after();
        assert_eq!(retry_after, Some(Duration::from_millis(u64::MAX)));
    }
}
