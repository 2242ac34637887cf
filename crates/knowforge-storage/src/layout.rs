//! On-disk layout of the pipeline's audit state

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{StorageError, StorageResult};

/// Resolves where each history document lives
///
/// Everything is kept under a single directory, `.knowforge/` inside the
/// document workspace unless configured otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Directory name used inside a workspace
    pub const DEFAULT_DIR: &'static str = ".knowforge";

    /// Use `root` as the storage directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default layout for a document workspace
    pub fn for_workspace(workspace: &Path) -> Self {
        Self::new(workspace.join(Self::DEFAULT_DIR))
    }

    /// Storage directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rollback history document
    pub fn rollback_history_path(&self) -> PathBuf {
        self.root.join("rollback-history.json")
    }

    /// Execution history document
    pub fn execution_history_path(&self) -> PathBuf {
        self.root.join("execution-history.json")
    }

    /// Approval document
    pub fn approvals_path(&self) -> PathBuf {
        self.root.join("approvals.json")
    }

    /// Learning feedback document
    pub fn feedback_path(&self) -> PathBuf {
        self.root.join("feedback.json")
    }

    /// Directory holding per-document version histories
    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    /// Create the storage directories
    pub async fn ensure(&self) -> StorageResult<()> {
        for dir in [self.root.clone(), self.versions_dir()] {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::directory_creation_failed(dir.clone(), e))?;
        }
        Ok(())
    }
}
