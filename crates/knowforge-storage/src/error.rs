//! Errors raised while reading or writing pipeline state

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures of the persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// A storage directory could not be created
    #[error("Cannot create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file operation failed
    #[error("Cannot {operation} {path}: {source}")]
    IoError {
        path: PathBuf,
        operation: IoOperation,
        source: std::io::Error,
    },

    /// A configuration file could not be parsed
    #[error("{path} is not valid {format}: {message}")]
    ParseError {
        path: PathBuf,
        format: String,
        message: String,
    },

    /// A history document could not be encoded
    #[error("Cannot encode history document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// File operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    Read,
    Write,
    Rename,
}

impl fmt::Display for IoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IoOperation::Read => "read",
            IoOperation::Write => "write",
            IoOperation::Rename => "rename into place",
        })
    }
}

impl StorageError {
    pub fn directory_creation_failed(path: PathBuf, source: std::io::Error) -> Self {
        StorageError::DirectoryCreationFailed { path, source }
    }

    pub fn io_error(path: PathBuf, operation: IoOperation, source: std::io::Error) -> Self {
        StorageError::IoError {
            path,
            operation,
            source,
        }
    }

    pub fn parse_error(path: PathBuf, format: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::ParseError {
            path,
            format: format.into(),
            message: message.into(),
        }
    }
}
