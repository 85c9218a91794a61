//! Named-policy facade over a [`TokenBucketStore`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::ports::{Clock, StoreError, SystemClock, TokenBucketStore};

use super::bucket::{BucketConfig, RateLimitDecision};

/// Rate limiter errors.
///
/// `RateLimited` is the only recoverable, user-facing variant. The others are
/// configuration or infrastructure failures and must never be reported as a
/// rejection.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Rate limited: {operation} for {key}, retry after {retry_after:?}")]
    RateLimited {
        operation: String,
        key: String,
        retry_after: Duration,
    },

    #[error("Unknown rate limit: {0}")]
    UnknownLimit(String),

    #[error("Cost {cost} exceeds capacity {capacity} of {operation}")]
    InvalidCost {
        operation: String,
        cost: u32,
        capacity: u32,
    },

    #[error("Rate limit store unavailable: {0}")]
    Store(#[from] StoreError),
}

impl RateLimitError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Per-call options for [`RateLimiter::limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitOptions {
    /// Tokens this call consumes.
    pub cost: u32,
    /// Turn a rejection into `Err(RateLimitError::RateLimited)`.
    pub throw_on_reject: bool,
}

impl Default for LimitOptions {
    fn default() -> Self {
        Self {
            cost: 1,
            throw_on_reject: false,
        }
    }
}

impl LimitOptions {
    pub fn throwing() -> Self {
        Self {
            throw_on_reject: true,
            ..Self::default()
        }
    }

    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }
}

/// Token bucket rate limiter keyed by operation name and caller key.
///
/// The limiter only decides; it never performs the gated action.
///
/// # Example
/// ```ignore
/// let limiter = RateLimiter::new(store, [(SEND_MESSAGE, config)]);
/// limiter.limit(SEND_MESSAGE, &author, LimitOptions::throwing()).await?;
/// messages.append(message).await?;
/// ```
pub struct RateLimiter {
    store: Arc<dyn TokenBucketStore>,
    clock: Arc<dyn Clock>,
    limits: HashMap<String, BucketConfig>,
}

impl RateLimiter {
    pub fn new<I, S>(store: Arc<dyn TokenBucketStore>, limits: I) -> Self
    where
        I: IntoIterator<Item = (S, BucketConfig)>,
        S: Into<String>,
    {
        Self {
            store,
            clock: Arc::new(SystemClock),
            limits: limits
                .into_iter()
                .map(|(name, config)| (name.into(), config))
                .collect(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fail with `UnknownLimit` if any of `operations` has no configuration.
    /// Call at startup so a missing limit never surfaces at request time.
    pub fn ensure_configured(&self, operations: &[&str]) -> Result<(), RateLimitError> {
        for operation in operations {
            self.config(operation)?;
        }
        Ok(())
    }

    pub fn config(&self, operation: &str) -> Result<&BucketConfig, RateLimitError> {
        self.limits
            .get(operation)
            .ok_or_else(|| RateLimitError::UnknownLimit(operation.to_string()))
    }

    /// Attempt to admit one call of `operation` for `key`.
    pub async fn limit(
        &self,
        operation: &str,
        key: &str,
        options: LimitOptions,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let config = self.checked_config(operation, options.cost)?;
        let decision = self
            .store
            .consume_or_reject(operation, key, config, options.cost, self.clock.now())
            .await?;

        match decision {
            RateLimitDecision::Rejected { retry_after } if options.throw_on_reject => {
                Err(RateLimitError::RateLimited {
                    operation: operation.to_string(),
                    key: key.to_string(),
                    retry_after,
                })
            }
            decision => Ok(decision),
        }
    }

    /// Decision `limit` would make right now, without consuming anything.
    pub async fn check(
        &self,
        operation: &str,
        key: &str,
        cost: u32,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let config = self.checked_config(operation, cost)?;
        Ok(self
            .store
            .peek(operation, key, config, cost, self.clock.now())
            .await?)
    }

    /// Restore a full bucket for `key`.
    pub async fn reset(&self, operation: &str, key: &str) -> Result<(), RateLimitError> {
        self.config(operation)?;
        Ok(self.store.reset(operation, key).await?)
    }

    fn checked_config(&self, operation: &str, cost: u32) -> Result<&BucketConfig, RateLimitError> {
        let config = self.config(operation)?;
        if cost > config.capacity() {
            return Err(RateLimitError::InvalidCost {
                operation: operation.to_string(),
                cost,
                capacity: config.capacity(),
            });
        }
        Ok(config)
    }
}
