//! One user's chat session: sends through the API and keeps the countdown in
//! step with the server's answers.

use std::sync::Arc;

use chatter_shared::dto::MessageResponse;
use tokio::sync::watch;
use uuid::Uuid;

use crate::api::ChatApi;
use crate::countdown::{Countdown, CountdownState, format_retry_time};
use crate::error::ClientError;

/// Messages fetched per refresh, matching the server default.
const DEFAULT_PAGE: u64 = 50;

pub struct ChatSession {
    api: Arc<dyn ChatApi>,
    author: String,
    countdown: Countdown,
}

impl ChatSession {
    pub fn new(api: Arc<dyn ChatApi>, author: impl Into<String>) -> Self {
        Self {
            api,
            author: author.into(),
            countdown: Countdown::new(),
        }
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Send a message as this session's author.
    ///
    /// Never retried automatically. An admitted send clears the countdown; a
    /// rejection restarts it from the server's `retryAfter`, even if a
    /// countdown was already running.
    pub async fn send(&mut self, body: &str) -> Result<Uuid, ClientError> {
        match self.api.send_message(&self.author, body).await {
            Ok(id) => {
                self.countdown.clear();
                Ok(id)
            }
            Err(ClientError::RateLimited { retry_after }) => {
                tracing::debug!(
                    author = %self.author,
                    retry_after_secs = retry_after.as_secs_f64(),
                    "Send rejected, restarting countdown"
                );
                self.countdown.start(retry_after);
                Err(ClientError::RateLimited { retry_after })
            }
            Err(e) => Err(e),
        }
    }

    /// Most recent messages in chronological order.
    pub async fn messages(&self) -> Result<Vec<MessageResponse>, ClientError> {
        self.api.recent_messages(Some(DEFAULT_PAGE)).await
    }

    /// Whether the send control should be enabled. Advisory only.
    pub fn can_send(&self) -> bool {
        !self.countdown.is_limited()
    }

    pub fn countdown_state(&self) -> CountdownState {
        self.countdown.state()
    }

    pub fn watch_countdown(&self) -> watch::Receiver<CountdownState> {
        self.countdown.subscribe()
    }

    /// Banner text while limited.
    pub fn status_text(&self) -> Option<String> {
        match self.countdown.state() {
            CountdownState::Idle => None,
            CountdownState::Limited { seconds_remaining } => Some(format!(
                "Rate limit reached. You can send another message in {}.",
                format_retry_time(seconds_remaining)
            )),
        }
    }
}
