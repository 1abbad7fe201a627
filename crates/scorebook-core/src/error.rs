//! Error types for scorebook-core

use thiserror::Error;

/// Result type alias using scorebook-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in scorebook-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Backup document failed validation before any mutation
    #[error("Invalid backup document: {0}")]
    Validation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Cloud row-store or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Create-only write hit an existing object
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
}

/// Coarse failure class used to pick a recovery hint for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The backup file or cloud record is malformed.
    BadFile,
    /// The cloud could not be reached or rejected the request.
    Network,
    /// The local device ran out of space.
    StorageFull,
    /// Any other local storage failure.
    Storage,
    /// Everything else.
    Other,
}

impl Error {
    /// Classify this error so restore/import failures can be reported distinctly.
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Validation(_) | Self::Serialization(_) => FailureCategory::BadFile,
            Self::Network(_) | Self::Storage(_) | Self::AlreadyExists(_) => {
                FailureCategory::Network
            }
            Self::LibSql(_) | Self::Database(_) | Self::Io(_) => {
                if is_storage_full(&self.to_string()) {
                    FailureCategory::StorageFull
                } else {
                    FailureCategory::Storage
                }
            }
            Self::NotFound(_) | Self::InvalidInput(_) => FailureCategory::Other,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

fn is_storage_full(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("database or disk is full")
        || message.contains("no space left on device")
        || message.contains("disk full")
}
