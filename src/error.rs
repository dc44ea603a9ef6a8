//! Error types for the chat service client.

use thiserror::Error;

/// Failure of a single exchange with the remote chat service.
///
/// The widget never shows these to the user: every variant collapses into the
/// same fallback message, and the detail goes to the log.
#[derive(Error, Debug)]
pub enum RequestFailure {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },
}

impl RequestFailure {
    /// HTTP status for `Api` failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::InvalidUrl(_) | Self::Json(_) => None,
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, RequestFailure>;
