//! # Chatter Client
//!
//! HTTP client for the chat API plus the client-side rate limit countdown.
//! The countdown is advisory: the server's answer to the next send always wins.

pub mod api;
pub mod countdown;
pub mod error;
pub mod session;

pub use api::{ChatApi, HttpChatClient};
pub use countdown::{Countdown, CountdownState, format_retry_time};
pub use error::ClientError;
pub use session::ChatSession;
