//! Error types for document store operations

use knowforge_storage::StorageError;

/// Errors that can occur during document operations
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Document not found at the specified path
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A document already exists where one was expected to be absent
    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    /// Invalid document path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid content provided
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// Requested section is missing from a document
    #[error("Section '{section}' not found in {path}")]
    SectionNotFound {
        /// Document path
        path: String,
        /// Section heading
        section: String,
    },

    /// IO error on a specific document
    #[error("IO error on {path}: {source}")]
    Io {
        /// Document path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Storage layer error
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DocumentError {
    /// Create an IO error for `path`
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        DocumentError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;
