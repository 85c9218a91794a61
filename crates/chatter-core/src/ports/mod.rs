//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod clock;
mod messages;
mod rate_limit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use messages::MessageRepository;
pub use rate_limit::{StoreError, TokenBucketStore};
