//! Client-side errors.

use std::time::Duration;

use chatter_shared::{ErrorKind, ErrorResponse};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Rate limited, retry after {:.1}s", .retry_after.as_secs_f64())]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {}", .error.title)]
    Api { status: u16, error: ErrorResponse },

    #[error("Unexpected response {status}: {body}")]
    Unexpected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// Classify a non-success response from its structured body.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let error = match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(error) => error,
            Err(_) => {
                return ClientError::Unexpected {
                    status,
                    body: String::from_utf8_lossy(body).into_owned(),
                };
            }
        };

        match error.retry_after() {
            Some(retry_after) if error.kind == ErrorKind::RateLimited => {
                ClientError::RateLimited { retry_after }
            }
            _ => ClientError::Api { status, error },
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ClientError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
