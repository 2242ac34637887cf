//! Error types for the refactoring pipeline

use knowforge_files::DocumentError;
use knowforge_learning::LearningError;
use knowforge_storage::StorageError;
use knowforge_versions::VersionError;
use thiserror::Error;

/// Errors that can occur while approving, executing or rolling back refactorings
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A required parameter was missing or empty
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// Structural validation failed
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Operation type is not supported
    #[error("Unknown operation type in operation {0}")]
    UnknownOperation(String),

    /// Suggestion is not in the registry
    #[error("Suggestion not found: {0}")]
    SuggestionNotFound(String),

    /// Approval does not exist
    #[error("Approval not found: {0}")]
    ApprovalNotFound(String),

    /// Configuration is invalid
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Document store error
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Version store error
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Learning engine error
    #[error(transparent)]
    Learning(#[from] LearningError),

    /// Persistence error
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ExecutionError {
    /// Name of the missing parameter, if this is a missing-parameter error
    pub fn missing_parameter(&self) -> Option<&str> {
        match self {
            ExecutionError::MissingParameter(name) => Some(name),
            _ => None,
        }
    }
}

/// Result type for pipeline operations
pub type ExecutionResult<T> = Result<T, ExecutionError>;
