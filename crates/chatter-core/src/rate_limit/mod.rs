//! Token bucket rate limiting: bucket arithmetic and the named-policy limiter.

mod bucket;
mod limiter;

pub use bucket::{BucketConfig, BucketState, ConfigError, RateLimitDecision, TOKEN_EPSILON};
pub use limiter::{LimitOptions, RateLimitError, RateLimiter};

/// Name of the limit guarding message submission.
pub const SEND_MESSAGE: &str = "sendMessage";
