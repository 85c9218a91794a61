//! # Chatter Core
//!
//! The domain layer of the Chatter backend.
//! This crate contains the message model, the ports infrastructure must
//! implement, and the token bucket rate limiter. It has zero infrastructure
//! dependencies.

pub mod domain;
pub mod error;
pub mod ports;
pub mod rate_limit;

pub use error::DomainError;
pub use rate_limit::{
    BucketConfig, LimitOptions, RateLimitDecision, RateLimitError, RateLimiter, SEND_MESSAGE,
};
