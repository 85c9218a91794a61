//! # Chatter Infrastructure
//!
//! Concrete implementations of the ports defined in `chatter-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `postgres` - PostgreSQL message storage via SeaORM
//! - `redis` - Redis token bucket store shared between processes

pub mod messages;
pub mod rate_limit;

#[cfg(feature = "postgres")]
pub mod database;

// Re-exports - In-Memory
pub use messages::InMemoryMessageRepository;
pub use rate_limit::InMemoryTokenBucketStore;

// Re-exports - External backends
#[cfg(feature = "postgres")]
pub use database::{DatabaseConfig, PostgresMessageRepository};
#[cfg(feature = "redis")]
pub use rate_limit::{RedisConfig, RedisRateLimitConfig, RedisTokenBucketStore};
