//! In-memory token bucket store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use chatter_core::ports::{StoreError, TokenBucketStore};
use chatter_core::rate_limit::{BucketConfig, BucketState, RateLimitDecision};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    operation: String,
    key: String,
}

impl BucketKey {
    fn new(operation: &str, key: &str) -> Self {
        Self {
            operation: operation.to_string(),
            key: key.to_string(),
        }
    }
}

/// In-memory token bucket store backed by a sharded map.
///
/// Each bucket is updated under its shard's entry lock, so refill-then-consume
/// is atomic per `(operation, key)` while unrelated keys proceed in parallel.
/// Note: Limits are per-process and lost on restart.
pub struct InMemoryTokenBucketStore {
    buckets: DashMap<BucketKey, BucketState>,
}

impl InMemoryTokenBucketStore {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop buckets untouched for longer than `max_idle`.
    ///
    /// With `max_idle` at least the longest full refill time of any limit, a
    /// dropped bucket would have been full again anyway.
    pub fn evict_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return 0;
        };
        let before = self.buckets.len();
        self.buckets
            .retain(|_, state| now - state.last_refill_at <= max_idle);
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.buckets.len(), "Evicted idle buckets");
        }
        evicted
    }
}

impl Default for InMemoryTokenBucketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenBucketStore for InMemoryTokenBucketStore {
    async fn consume_or_reject(
        &self,
        operation: &str,
        key: &str,
        config: &BucketConfig,
        cost: u32,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError> {
        // The entry guard is the per-key critical section; nothing awaits while it is held.
        let mut state = self
            .buckets
            .entry(BucketKey::new(operation, key))
            .or_insert_with(|| BucketState::full(config, now));

        Ok(state.consume_or_reject(config, cost, now))
    }

    async fn peek(
        &self,
        operation: &str,
        key: &str,
        config: &BucketConfig,
        cost: u32,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError> {
        let mut state = self
            .buckets
            .get(&BucketKey::new(operation, key))
            .map(|entry| *entry.value())
            .unwrap_or_else(|| BucketState::full(config, now));

        state.refill(config, now);
        Ok(state.decide(config, cost))
    }

    async fn reset(&self, operation: &str, key: &str) -> Result<(), StoreError> {
        self.buckets.remove(&BucketKey::new(operation, key));
        tracing::debug!(operation = %operation, key = %key, "Bucket reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chatter_core::ports::ManualClock;
    use chatter_core::rate_limit::{LimitOptions, RateLimiter, SEND_MESSAGE};
    use chrono::TimeZone;

    fn config() -> BucketConfig {
        BucketConfig::new(3, 10, Duration::from_secs(60)).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_burst_admission() {
        let store = InMemoryTokenBucketStore::new();
        let config = config();

        for _ in 0..3 {
            let decision = store
                .consume_or_reject(SEND_MESSAGE, "alice", &config, 1, t0())
                .await
                .unwrap();
            assert!(decision.is_admitted());
        }

        let decision = store
            .consume_or_reject(SEND_MESSAGE, "alice", &config, 1, t0())
            .await
            .unwrap();
        assert_eq!(decision.retry_after(), Some(Duration::from_secs(6)));
    }

    #[tokio::test]
    async fn test_operations_do_not_share_buckets() {
        let store = InMemoryTokenBucketStore::new();
        let config = config();

        store
            .consume_or_reject(SEND_MESSAGE, "alice", &config, 3, t0())
            .await
            .unwrap();
        let decision = store
            .consume_or_reject("editMessage", "alice", &config, 3, t0())
            .await
            .unwrap();
        assert!(decision.is_admitted());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_peek_creates_nothing() {
        let store = InMemoryTokenBucketStore::new();

        let decision = store
            .peek(SEND_MESSAGE, "alice", &config(), 1, t0())
            .await
            .unwrap();
        assert!(decision.is_admitted());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_evict_idle_buckets() {
        let store = InMemoryTokenBucketStore::new();
        let config = config();
        store
            .consume_or_reject(SEND_MESSAGE, "alice", &config, 1, t0())
            .await
            .unwrap();
        store
            .consume_or_reject(SEND_MESSAGE, "bob", &config, 1, t0() + chrono::Duration::seconds(30))
            .await
            .unwrap();

        let now = t0() + chrono::Duration::seconds(40);
        assert_eq!(store.evict_idle(now, config.full_refill_time()), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_admit_exactly_capacity() {
        let store: Arc<dyn TokenBucketStore> = Arc::new(InMemoryTokenBucketStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let limiter = Arc::new(
            RateLimiter::new(store, [(SEND_MESSAGE, config())]).with_clock(clock),
        );

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter
                        .limit(SEND_MESSAGE, "alice", LimitOptions::default())
                        .await
                        .unwrap()
                })
            })
            .collect();

        let decisions: Vec<RateLimitDecision> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let admitted = decisions.iter().filter(|d| d.is_admitted()).count();
        assert_eq!(admitted, 3);
        assert!(
            decisions
                .iter()
                .filter(|d| !d.is_admitted())
                .all(|d| d.retry_after().is_some_and(|r| r > Duration::ZERO))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_keys_are_isolated() {
        let store = Arc::new(InMemoryTokenBucketStore::new());
        let config = config();

        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let key = format!("user-{}", i % 10);
                    store
                        .consume_or_reject(SEND_MESSAGE, &key, &config, 1, t0())
                        .await
                        .unwrap()
                })
            })
            .collect();

        let admitted = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|joined| joined.as_ref().unwrap().is_admitted())
            .count();
        assert_eq!(admitted, 30);
    }
}
