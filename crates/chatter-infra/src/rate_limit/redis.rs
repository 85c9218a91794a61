//! Redis token bucket store. Buckets live in hashes updated by a Lua script.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use chatter_core::ports::{StoreError, TokenBucketStore};
use chatter_core::rate_limit::{BucketConfig, RateLimitDecision, TOKEN_EPSILON};

/// Refill, decide and optionally consume in one atomic step.
///
/// KEYS[1] bucket hash. ARGV: capacity, refill rate, period (ms), cost,
/// now (ms since epoch), consume flag, epsilon, ttl (ms).
/// Returns `{admitted, tokens}` with tokens as a string to keep the fraction.
const TOKEN_BUCKET_LUA: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local period_ms = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])
local now_ms = tonumber(ARGV[5])
local consume = ARGV[6] == '1'
local epsilon = tonumber(ARGV[7])
local ttl_ms = tonumber(ARGV[8])

local state = redis.call('HMGET', key, 'tokens', 'ts')
local tokens = tonumber(state[1])
local ts = tonumber(state[2])
local fresh = tokens == nil or ts == nil
if fresh then
    tokens = capacity
    ts = now_ms
end

if now_ms > ts then
    tokens = math.min(capacity, tokens + (now_ms - ts) * rate / period_ms)
    ts = now_ms
end

local admitted = 0
if tokens + epsilon >= cost then
    admitted = 1
    if consume then
        tokens = math.max(0, tokens - cost)
    end
end

if consume then
    redis.call('HSET', key, 'tokens', tostring(tokens), 'ts', tostring(ts))
    redis.call('PEXPIRE', key, ttl_ms)
end

return {admitted, tostring(tokens)}
"#;

/// Largest TTL passed to PEXPIRE; Redis rejects expiry times that overflow.
const MAX_TTL_MS: u64 = i64::MAX as u64 / 2;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A bucket idle this long is full again; keep a second of slack.
fn ttl_ms(config: &BucketConfig) -> u64 {
    millis(config.full_refill_time())
        .saturating_add(1000)
        .min(MAX_TTL_MS)
}

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whether to fall back to the in-memory store if Redis is unavailable
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: true,
        }
    }
}

/// Redis token bucket store configuration.
#[derive(Debug, Clone)]
pub struct RedisRateLimitConfig {
    /// Redis connection config
    pub redis: RedisConfig,
    /// Key prefix for bucket hashes
    pub key_prefix: String,
}

impl Default for RedisRateLimitConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            key_prefix: "ratelimit".to_string(),
        }
    }
}

/// Redis-backed token bucket store.
///
/// Redis runs each script invocation atomically, which gives per-key
/// exclusion across every process sharing the instance. Bucket hashes expire
/// once they would have refilled completely, so an evicted bucket is
/// indistinguishable from a full one.
pub struct RedisTokenBucketStore {
    conn: ConnectionManager,
    config: RedisRateLimitConfig,
    script: Script,
}

impl RedisTokenBucketStore {
    pub async fn new(config: RedisRateLimitConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.redis.url.as_str())
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.redis.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Connection("Connection timed out".to_string()))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(url = %config.redis.url, "Connected to Redis token bucket store");

        Ok(Self {
            conn,
            config,
            script: Script::new(TOKEN_BUCKET_LUA),
        })
    }

    fn make_key(&self, operation: &str, key: &str) -> String {
        format!("{}:{}:{}", self.config.key_prefix, operation, key)
    }

    async fn run(
        &self,
        operation: &str,
        key: &str,
        config: &BucketConfig,
        cost: u32,
        now: DateTime<Utc>,
        consume: bool,
    ) -> Result<RateLimitDecision, StoreError> {
        let redis_key = self.make_key(operation, key);
        let mut conn = self.conn.clone();

        let (admitted, tokens): (i64, String) = self
            .script
            .key(&redis_key)
            .arg(config.capacity())
            .arg(config.refill_rate())
            .arg(millis(config.period()))
            .arg(cost)
            .arg(now.timestamp_millis())
            .arg(if consume { "1" } else { "0" })
            .arg(TOKEN_EPSILON)
            .arg(ttl_ms(config))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if admitted == 1 {
            return Ok(RateLimitDecision::Admitted);
        }

        let tokens: f64 = tokens
            .parse()
            .map_err(|_| StoreError::Backend(format!("Invalid token count: {}", tokens)))?;

        Ok(RateLimitDecision::Rejected {
            retry_after: config.retry_after(tokens, cost),
        })
    }
}

#[async_trait]
impl TokenBucketStore for RedisTokenBucketStore {
    async fn consume_or_reject(
        &self,
        operation: &str,
        key: &str,
        config: &BucketConfig,
        cost: u32,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError> {
        self.run(operation, key, config, cost, now, true).await
    }

    async fn peek(
        &self,
        operation: &str,
        key: &str,
        config: &BucketConfig,
        cost: u32,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError> {
        self.run(operation, key, config, cost, now, false).await
    }

    async fn reset(&self, operation: &str, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(self.make_key(operation, key))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::debug!(operation = %operation, key = %key, "Bucket reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn get_test_store() -> Option<RedisTokenBucketStore> {
        let config = RedisRateLimitConfig {
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
                connect_timeout: Duration::from_secs(1),
                fallback_to_memory: false,
            },
            key_prefix: format!("test_ratelimit_{}", uuid::Uuid::new_v4()),
        };

        RedisTokenBucketStore::new(config).await.ok()
    }

    #[test]
    fn test_ttl_covers_full_refill() {
        let config = BucketConfig::new(3, 10, Duration::from_secs(60)).unwrap();
        assert_eq!(ttl_ms(&config), 19_000);
        assert_eq!(millis(config.period()), 60_000);
    }

    #[test]
    fn test_extreme_period_is_clamped() {
        let config = BucketConfig::new(3, 1, Duration::from_secs(u64::MAX)).unwrap();
        assert_eq!(millis(config.period()), u64::MAX);
        assert_eq!(ttl_ms(&config), MAX_TTL_MS);
    }

    #[tokio::test]
    async fn test_redis_token_bucket() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };
        let config = BucketConfig::new(3, 10, Duration::from_secs(60)).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        for _ in 0..3 {
            let res = store
                .consume_or_reject("sendMessage", "alice", &config, 1, t0)
                .await
                .unwrap();
            assert!(res.is_admitted());
        }

        let res = store
            .consume_or_reject("sendMessage", "alice", &config, 1, t0)
            .await
            .unwrap();
        assert_eq!(res.retry_after(), Some(Duration::from_secs(6)));

        // Other keys are untouched
        let res = store
            .peek("sendMessage", "bob", &config, 3, t0)
            .await
            .unwrap();
        assert!(res.is_admitted());

        // One token is back after the advertised wait
        let later = t0 + chrono::Duration::seconds(6);
        let res = store
            .consume_or_reject("sendMessage", "alice", &config, 1, later)
            .await
            .unwrap();
        assert!(res.is_admitted());

        store.reset("sendMessage", "alice").await.unwrap();
        let res = store
            .consume_or_reject("sendMessage", "alice", &config, 3, later)
            .await
            .unwrap();
        assert!(res.is_admitted());
    }
}
