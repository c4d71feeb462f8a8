//! Error types for todolist-core

use thiserror::Error;

/// Result type alias using todolist-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for sync and remote operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors that can occur in local store operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry not found
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the remote client and the sync engine.
///
/// Only `Network` is worth retrying, and only on the next scheduled sync.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport or connectivity failure
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed URI or illegal argument
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unparseable or unexpected payload
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The server answered with a 4xx status
    #[error("Server rejected request ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    /// Local store failure during a sync phase
    #[error(transparent)]
    Store(#[from] Error),
}

impl SyncError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::ServerRejected {
            status,
            message: message.into(),
        }
    }

    /// Whether the next scheduled sync may succeed without user action.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Short label used by notifiers and logs.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidResponse(_) => "invalid_response",
            Self::ServerRejected { .. } => "server_rejected",
            Self::Store(_) => "store",
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Store(Error::Sqlite(error))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            Self::InvalidRequest(error.to_string())
        } else if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}
