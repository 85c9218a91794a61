//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "postgres")]
use chatter_infra::DatabaseConfig;
#[cfg(feature = "redis")]
use chatter_infra::{RedisConfig, RedisRateLimitConfig};

use crate::telemetry::TelemetryConfig;

/// Largest page a client may request from `GET /api/messages`.
pub const MAX_PAGE_SIZE: u64 = 200;

/// Raw token bucket parameters for one limited operation.
/// Validated when the limiter is built.
#[derive(Debug, Clone, Copy)]
pub struct LimitSettings {
    pub capacity: u32,
    pub refill_rate: u32,
    pub period: Duration,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub send_message: LimitSettings,
    pub page_size: u64,
    pub telemetry: TelemetryConfig,
    #[cfg(feature = "postgres")]
    pub database: Option<DatabaseConfig>,
    #[cfg(feature = "redis")]
    pub redis: Option<RedisRateLimitConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Fails when a limit parameter is set but not a valid number.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080),
            send_message: LimitSettings::from_env()?,
            page_size: parse_var("MESSAGE_PAGE_SIZE", 50).clamp(1, MAX_PAGE_SIZE),
            telemetry: TelemetryConfig::from_env(),
            #[cfg(feature = "postgres")]
            database: env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
                url,
                max_connections: parse_var("DB_MAX_CONNECTIONS", 20),
                min_connections: parse_var("DB_MIN_CONNECTIONS", 2),
            }),
            #[cfg(feature = "redis")]
            redis: env::var("REDIS_URL").ok().map(|url| RedisRateLimitConfig {
                redis: RedisConfig {
                    url,
                    connect_timeout: Duration::from_secs(parse_var(
                        "REDIS_CONNECT_TIMEOUT_SECS",
                        5,
                    )),
                    fallback_to_memory: env::var("REDIS_FALLBACK_TO_MEMORY")
                        .map(|v| v == "true" || v == "1")
                        .unwrap_or(true),
                },
                key_prefix: env::var("RATE_LIMIT_KEY_PREFIX")
                    .unwrap_or_else(|_| "ratelimit".to_string()),
            }),
        })
    }
}

impl LimitSettings {
    /// `sendMessage` parameters: ~1 message every 6 seconds, bursts of 3.
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            capacity: parse_setting("SEND_MESSAGE_CAPACITY", env::var("SEND_MESSAGE_CAPACITY").ok(), 3)?,
            refill_rate: parse_setting("SEND_MESSAGE_RATE", env::var("SEND_MESSAGE_RATE").ok(), 10)?,
            period: Duration::from_secs(parse_setting(
                "SEND_MESSAGE_PERIOD_SECS",
                env::var("SEND_MESSAGE_PERIOD_SECS").ok(),
                60,
            )?),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Like `parse_var`, but a value that is present and unparsable is an error.
fn parse_setting<T: FromStr>(name: &str, raw: Option<String>, default: T) -> anyhow::Result<T> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer, got {:?}", name, raw)),
    }
}
