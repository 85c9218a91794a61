//! In-memory message log - used when no database is configured.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use chatter_core::domain::{Message, MessageId, NewMessage};
use chatter_core::error::RepoError;
use chatter_core::ports::MessageRepository;

/// Append-only message log kept in insertion order.
///
/// Note: Data is lost on process restart.
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryMessageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: NewMessage) -> Result<MessageId, RepoError> {
        let mut messages = self.messages.write().await;
        let message = message.into_message(Utc::now());
        let id = message.id;
        messages.push(message);
        Ok(id)
    }

    async fn recent(&self, limit: u64) -> Result<Vec<Message>, RepoError> {
        let messages = self.messages.read().await;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(messages.iter().rev().take(limit).cloned().collect())
    }
}
