//! # Chatter Shared
//!
//! Wire types shared by the chat server and its clients.

pub mod dto;
pub mod response;

pub use response::{ErrorKind, ErrorResponse};
