use async_trait::async_trait;

use crate::domain::{Message, MessageId, NewMessage};
use crate::error::RepoError;

/// Append-only message log.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Store a message and return its id.
    async fn append(&self, message: NewMessage) -> Result<MessageId, RepoError>;

    /// Up to `limit` most recent messages, newest first.
    async fn recent(&self, limit: u64) -> Result<Vec<Message>, RepoError>;
}
