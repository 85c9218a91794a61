//! Application state - shared across all handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chatter_core::ports::{Clock, MessageRepository, SystemClock, TokenBucketStore};
use chatter_core::rate_limit::{BucketConfig, RateLimiter, SEND_MESSAGE};
use chatter_infra::{InMemoryMessageRepository, InMemoryTokenBucketStore};

use crate::config::{AppConfig, LimitSettings};

/// How often idle in-memory buckets are swept.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub messages: Arc<dyn MessageRepository>,
    pub page_size: u64,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    ///
    /// Fails on invalid limit parameters, or when an explicitly configured
    /// backend is unreachable and no fallback is allowed.
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let send_message = bucket_config(&config.send_message)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = build_store(config, send_message.full_refill_time(), clock.clone()).await?;
        let limiter = RateLimiter::new(store, [(SEND_MESSAGE, send_message)]).with_clock(clock);
        limiter.ensure_configured(&[SEND_MESSAGE])?;

        let messages = build_messages(config).await?;

        tracing::info!(
            capacity = send_message.capacity(),
            refill_rate = send_message.refill_rate(),
            period_secs = send_message.period().as_secs_f64(),
            "Application state initialized"
        );

        Ok(Self::from_parts(Arc::new(limiter), messages, config.page_size))
    }

    pub fn from_parts(
        limiter: Arc<RateLimiter>,
        messages: Arc<dyn MessageRepository>,
        page_size: u64,
    ) -> Self {
        Self {
            limiter,
            messages,
            page_size,
        }
    }
}

fn bucket_config(settings: &LimitSettings) -> anyhow::Result<BucketConfig> {
    BucketConfig::new(settings.capacity, settings.refill_rate, settings.period)
        .with_context(|| format!("invalid {} limit", SEND_MESSAGE))
}

async fn build_store(
    config: &AppConfig,
    max_idle: Duration,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Arc<dyn TokenBucketStore>> {
    #[cfg(feature = "redis")]
    if let Some(redis_config) = &config.redis {
        match chatter_infra::RedisTokenBucketStore::new(redis_config.clone()).await {
            Ok(store) => return Ok(Arc::new(store)),
            Err(e) if redis_config.redis.fallback_to_memory => {
                tracing::error!(
                    "Failed to connect to Redis: {}. Using in-memory rate limit store.",
                    e
                );
            }
            Err(e) => return Err(e).context("Redis token bucket store unavailable"),
        }
    }

    #[cfg(not(feature = "redis"))]
    let _ = config;

    tracing::info!("Using in-memory rate limit store");
    let store = Arc::new(InMemoryTokenBucketStore::new());
    spawn_bucket_eviction(store.clone(), max_idle, clock);
    Ok(store)
}

async fn build_messages(config: &AppConfig) -> anyhow::Result<Arc<dyn MessageRepository>> {
    #[cfg(feature = "postgres")]
    {
        if let Some(db_config) = &config.database {
            let db = chatter_infra::database::connect(db_config)
                .await
                .context("Failed to connect to database")?;
            chatter_infra::database::ensure_schema(&db)
                .await
                .context("Failed to prepare messages schema")?;
            return Ok(Arc::new(chatter_infra::PostgresMessageRepository::new(db)));
        }
        tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
    }

    #[cfg(not(feature = "postgres"))]
    {
        let _ = config;
        tracing::info!("Running without postgres feature - using in-memory message log");
    }

    Ok(Arc::new(InMemoryMessageRepository::new()))
}

/// Periodically drop buckets that have been idle long enough to be full again.
fn spawn_bucket_eviction(
    store: Arc<InMemoryTokenBucketStore>,
    max_idle: Duration,
    clock: Arc<dyn Clock>,
) {
    actix_rt::spawn(async move {
        let mut interval = actix_rt::time::interval(EVICTION_INTERVAL);
        loop {
            interval.tick().await;
            store.evict_idle(clock.now(), max_idle);
        }
    });
}
