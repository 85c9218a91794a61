//! PostgreSQL message repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{DbConn, EntityTrait, QueryOrder, QuerySelect};

use chatter_core::domain::{Message, MessageId, NewMessage};
use chatter_core::error::RepoError;
use chatter_core::ports::MessageRepository;

use super::entity::message::{self, Entity as MessageEntity};

/// PostgreSQL message repository.
pub struct PostgresMessageRepository {
    db: DbConn,
}

impl PostgresMessageRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn append(&self, message: NewMessage) -> Result<MessageId, RepoError> {
        let message = message.into_message(Utc::now());
        let id = message.id;
        tracing::debug!(message_id = %id, author = %message.author, "Appending message");

        MessageEntity::insert(message::ActiveModel::from(message))
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| RepoError::Query(e.to_string()))?;

        Ok(id)
    }

    async fn recent(&self, limit: u64) -> Result<Vec<Message>, RepoError> {
        let result = MessageEntity::find()
            .order_by_desc(message::Column::InsertedAt)
            .order_by_desc(message::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(|e| RepoError::Query(e.to_string()))?;

        Ok(result.into_iter().map(Into::into).collect())
    }
}
