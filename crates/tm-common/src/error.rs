use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by a ranking call. Everything else is recovered locally.
#[derive(Debug, Error)]
pub enum RankError {
    #[error("current user profile is required")]
    MissingCurrentUser,
    #[error("invalid profile {id:?}: {reason}")]
    InvalidProfile { id: String, reason: String },
}

/// Failures talking to the external reasoning service. These never leave the
/// compatibility analyzer; they are replaced with neutral scores there.
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("reasoning service disabled: {0}")]
    Disabled(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ReasoningError {
    /// Whether another attempt could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReasoningError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            ReasoningError::Status { status, .. } => *status == 429 || *status >= 500,
            ReasoningError::Timeout(_) => true,
            ReasoningError::Disabled(_)
            | ReasoningError::Malformed(_)
            | ReasoningError::Config(_) => false,
        }
    }
}

impl From<serde_json::Error> for ReasoningError {
    fn from(value: serde_json::Error) -> Self {
        ReasoningError::Malformed(value.to_string())
    }
}
