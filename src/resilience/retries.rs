//! Retry classification.
//!
//! # Responsibilities
//! - Let each operation say whether its failure may be retried
//! - Classify HTTP dependency failures (transport errors and status codes)
//!
//! # Design Decisions
//! - Retryable is the default; validation-style failures opt out
//! - Connection errors always retryable; 5xx, 408 and 429 retryable
//! - Other 4xx are the caller's fault and are never retried

use reqwest::StatusCode;
use thiserror::Error;

/// Classification of an operation's error for the envelope.
pub trait Retryable {
    /// Whether another attempt could succeed. Non-retryable failures are
    /// returned to the caller immediately.
    fn is_retryable(&self) -> bool {
        true
    }
}

impl Retryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            std::io::ErrorKind::InvalidInput
                | std::io::ErrorKind::InvalidData
                | std::io::ErrorKind::PermissionDenied
                | std::io::ErrorKind::Unsupported
        )
    }
}

impl Retryable for reqwest::Error {
    fn is_retryable(&self) -> bool {
        if self.is_builder() || self.is_redirect() || self.is_decode() {
            return false;
        }
        match self.status() {
            Some(status) => is_retryable_status(status),
            None => true,
        }
    }
}

/// Whether an HTTP response status indicates a transient dependency failure.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Failure of an HTTP call to a dependency.
#[derive(Debug, Error)]
pub enum HttpCallError {
    /// The request never produced a response (connect, TLS, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The dependency answered with a non-success status.
    #[error("dependency responded with {0}")]
    Status(StatusCode),
}

impl HttpCallError {
    /// Turn a response into `Ok` for 2xx and `Err(Status)` otherwise.
    pub fn check(response: reqwest::Response) -> Result<reqwest::Response, Self> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(HttpCallError::Status(status))
        }
    }
}

impl Retryable for HttpCallError {
    fn is_retryable(&self) -> bool {
        match self {
            HttpCallError::Transport(e) => e.is_retryable(),
            HttpCallError::Status(status) => is_retryable_status(*status),
        }
    }
}
