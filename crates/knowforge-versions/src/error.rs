//! Error types for the version store

use knowforge_storage::StorageError;
use thiserror::Error;

/// Errors that can occur in the version store
#[derive(Debug, Error)]
pub enum VersionError {
    /// No history exists for the document
    #[error("No version history for {0}")]
    HistoryNotFound(String),

    /// Requested version is not in the document's history
    #[error("Version {version} not found for {path}")]
    VersionNotFound {
        /// Document path
        path: String,
        /// Requested version
        version: u64,
    },

    /// A document's history file exists but cannot be read
    #[error("Version history of {path} is unreadable; refusing to overwrite {file}")]
    CorruptHistory {
        /// Document path
        path: String,
        /// History file on disk
        file: String,
    },

    /// Invalid document path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl VersionError {
    /// Create a new VersionNotFound error
    pub fn version_not_found(path: impl Into<String>, version: u64) -> Self {
        Self::VersionNotFound {
            path: path.into(),
            version,
        }
    }

    /// Create a new ValidationError with context
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

impl From<knowforge_files::DocumentError> for VersionError {
    fn from(err: knowforge_files::DocumentError) -> Self {
        match err {
            knowforge_files::DocumentError::InvalidPath(msg) => VersionError::InvalidPath(msg),
            other => VersionError::ValidationError(other.to_string()),
        }
    }
}

/// Result type for version store operations
pub type VersionResult<T> = Result<T, VersionError>;
