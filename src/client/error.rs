//! Client-side error type.

use thiserror::Error;

use crate::domain::TaskId;

/// Errors that can occur while talking to the task board server.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The server does not know this task.
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// The server rejected the request.
    #[error("Server responded {status}: {message}")]
    Server {
        status: u16,
        message: String,
        details: Vec<String>,
    },

    /// The base URL cannot carry task paths.
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    /// The response body was not what the API promises.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl SyncError {
    /// Returns `true` for a 404 on a single task.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}
