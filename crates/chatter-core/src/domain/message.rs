use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Longest accepted message body, in characters.
pub const MAX_BODY_CHARS: usize = 2000;

pub type MessageId = Uuid;

/// Message entity - one entry of the shared chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: String,
    pub body: String,
    pub inserted_at: DateTime<Utc>,
}

/// A validated message that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    author: String,
    body: String,
}

impl NewMessage {
    /// Validate author and body. Surrounding whitespace is trimmed.
    pub fn new(author: &str, body: &str) -> Result<Self, DomainError> {
        let author = author.trim();
        let body = body.trim();

        if author.is_empty() {
            return Err(DomainError::Validation("author must not be empty".to_string()));
        }
        if body.is_empty() {
            return Err(DomainError::Validation("body must not be empty".to_string()));
        }
        if body.chars().count() > MAX_BODY_CHARS {
            return Err(DomainError::Validation(format!(
                "body must be at most {} characters",
                MAX_BODY_CHARS
            )));
        }

        Ok(Self {
            author: author.to_string(),
            body: body.to_string(),
        })
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Assign identity and insertion time.
    pub fn into_message(self, inserted_at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            author: self.author,
            body: self.body,
            inserted_at,
        }
    }
}
