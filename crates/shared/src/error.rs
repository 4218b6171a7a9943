use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body the service attaches to every non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error}")]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }

    /// The server message, or `None` when it is blank.
    pub fn message(&self) -> Option<&str> {
        let trimmed = self.error.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}
