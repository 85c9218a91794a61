//! Error handling - RFC 7807 responses carrying a machine-readable `kind`.

use std::fmt;
use std::time::Duration;

use actix_web::{HttpResponse, ResponseError, http::StatusCode, http::header};
use chatter_core::RateLimitError;
use chatter_shared::ErrorResponse;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug)]
pub enum AppError {
    RateLimited { retry_after: Duration },
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::RateLimited { retry_after } => {
                write!(f, "Rate limited: retry after {:.3}s", retry_after.as_secs_f64())
            }
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            AppError::RateLimited { retry_after } => {
                // Header carries whole seconds; the body keeps the fraction.
                let header_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
                return HttpResponse::build(self.status_code())
                    .insert_header((header::RETRY_AFTER, header_secs.to_string()))
                    .json(ErrorResponse::rate_limited(*retry_after));
            }
            AppError::BadRequest(detail) => ErrorResponse::bad_request(detail),
            AppError::NotFound(detail) => ErrorResponse::not_found(detail),
            AppError::Unavailable(detail) => ErrorResponse::unavailable(detail),
            AppError::Internal(detail) => {
                // Log internal errors
                tracing::error!("Internal error: {}", detail);
                ErrorResponse::internal_error()
            }
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::RateLimited {
                operation,
                key,
                retry_after,
            } => {
                tracing::warn!(
                    operation = %operation,
                    key = %key,
                    retry_after_secs = retry_after.as_secs_f64(),
                    "Rate limit exceeded"
                );
                AppError::RateLimited { retry_after }
            }
            RateLimitError::Store(e) => {
                tracing::error!("Rate limit store error: {}", e);
                AppError::Unavailable("Rate limit store unavailable".to_string())
            }
            err @ (RateLimitError::UnknownLimit(_) | RateLimitError::InvalidCost { .. }) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<chatter_core::DomainError> for AppError {
    fn from(err: chatter_core::DomainError) -> Self {
        match err {
            chatter_core::DomainError::Validation(msg) => AppError::BadRequest(msg),
        }
    }
}

impl From<chatter_core::error::RepoError> for AppError {
    fn from(err: chatter_core::error::RepoError) -> Self {
        match err {
            chatter_core::error::RepoError::Connection(msg) => {
                tracing::error!("Database connection error: {}", msg);
                AppError::Unavailable("Database unavailable".to_string())
            }
            chatter_core::error::RepoError::Query(msg) => {
                tracing::error!("Database query error: {}", msg);
                AppError::Internal("Database error".to_string())
            }
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
