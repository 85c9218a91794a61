//! Error payload (RFC 7807 Problem Details, extended with a machine-readable kind).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Failure class of an API error. Clients branch on this, never on text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    RateLimited,
    BadRequest,
    NotFound,
    Unavailable,
    Internal,
}

/// RFC 7807 Problem Details for HTTP APIs.
///
/// See: https://datatracker.ietf.org/doc/html/rfc7807
///
/// Rate limit rejections serialize as
/// `{"kind": "RateLimited", "retryAfter": 6.0, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub error_type: String,

    /// A short, human-readable summary of the problem type.
    pub title: String,

    /// The HTTP status code.
    pub status: u16,

    /// Machine-readable failure class.
    pub kind: ErrorKind,

    /// A human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Seconds until a retry can succeed, fractional. Set for `RateLimited` only.
    #[serde(
        rename = "retryAfter",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub retry_after: Option<f64>,
}

impl ErrorResponse {
    pub fn new(status: u16, kind: ErrorKind, title: impl Into<String>) -> Self {
        Self {
            error_type: "about:blank".to_string(),
            title: title.into(),
            status,
            kind,
            detail: None,
            retry_after: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    // Common error constructors
    pub fn rate_limited(retry_after: Duration) -> Self {
        let mut error = Self::new(429, ErrorKind::RateLimited, "Too Many Requests");
        error.retry_after = Some(retry_after.as_secs_f64());
        error
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, ErrorKind::BadRequest, "Bad Request").with_detail(detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(404, ErrorKind::NotFound, "Not Found").with_detail(detail)
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(503, ErrorKind::Unavailable, "Service Unavailable").with_detail(detail)
    }

    pub fn internal_error() -> Self {
        Self::new(500, ErrorKind::Internal, "Internal Server Error")
    }

    /// Retry delay of a `RateLimited` error. Values a `Duration` cannot hold
    /// (negative, non-finite or out of range) are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        if self.kind != ErrorKind::RateLimited {
            return None;
        }
        self.retry_after
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
