//! Domain entities - the core business objects.

mod message;

pub use message::{MAX_BODY_CHARS, Message, MessageId, NewMessage};
