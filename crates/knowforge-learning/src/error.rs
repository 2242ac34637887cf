/// Learning engine error types
use knowforge_storage::StorageError;
use thiserror::Error;

/// Errors that can occur in the learning engine
#[derive(Debug, Error)]
pub enum LearningError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid feedback: {0}")]
    InvalidFeedback(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

/// Result type for learning operations
pub type Result<T> = std::result::Result<T, LearningError>;
