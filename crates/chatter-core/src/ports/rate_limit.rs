//! Token bucket store port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::rate_limit::{BucketConfig, RateLimitDecision};

/// Store trait - persists bucket state and applies refill-then-consume atomically.
///
/// Implementations must serialize calls for the same `(operation, key)` pair
/// without serializing unrelated keys. A missing bucket is created full.
#[async_trait]
pub trait TokenBucketStore: Send + Sync {
    /// Refill the bucket to `now`, then consume `cost` tokens if available.
    /// The refreshed state is persisted on both outcomes.
    async fn consume_or_reject(
        &self,
        operation: &str,
        key: &str,
        config: &BucketConfig,
        cost: u32,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError>;

    /// Decision `consume_or_reject` would return, with no state change.
    async fn peek(
        &self,
        operation: &str,
        key: &str,
        config: &BucketConfig,
        cost: u32,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError>;

    /// Forget the bucket; the next use starts from a full one.
    async fn reset(&self, operation: &str, key: &str) -> Result<(), StoreError>;
}

/// Store infrastructure errors. Never used to signal a rejection.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Backend error: {0}")]
    Backend(String),
}
