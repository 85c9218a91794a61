//! Chat API port and its HTTP implementation.

use async_trait::async_trait;
use chatter_shared::dto::{MessageResponse, SendMessageRequest, SendMessageResponse};
use uuid::Uuid;

use crate::error::ClientError;

/// Operations a chat front end needs from the server.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Post a message. Rejections surface as [`ClientError::RateLimited`].
    async fn send_message(&self, author: &str, body: &str) -> Result<Uuid, ClientError>;

    /// Recent messages, oldest first.
    async fn recent_messages(&self, limit: Option<u64>) -> Result<Vec<MessageResponse>, ClientError>;
}

/// `ChatApi` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatClient {
    /// `base_url` is the server root, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await?;
        Err(ClientError::from_response(status.as_u16(), &body))
    }
}

#[async_trait]
impl ChatApi for HttpChatClient {
    async fn send_message(&self, author: &str, body: &str) -> Result<Uuid, ClientError> {
        let response = self
            .client
            .post(self.url("/api/messages"))
            .json(&SendMessageRequest {
                author: author.to_string(),
                body: body.to_string(),
            })
            .send()
            .await?;

        let sent: SendMessageResponse = Self::check(response).await?.json().await?;
        Ok(sent.id)
    }

    async fn recent_messages(&self, limit: Option<u64>) -> Result<Vec<MessageResponse>, ClientError> {
        let mut request = self.client.get(self.url("/api/messages"));
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        let response = request.send().await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
