//! Token bucket store implementations.

mod memory;

pub use memory::InMemoryTokenBucketStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisRateLimitConfig, RedisTokenBucketStore};
