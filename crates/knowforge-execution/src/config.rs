//! Pipeline configuration
//!
//! Loaded from YAML, TOML or JSON; the format follows the file extension.
//! Every section falls back to its defaults when omitted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use knowforge_files::FileSystemDocumentStore;
use knowforge_learning::LearningConfig;
use knowforge_storage::{ConfigLoader, StorageLayout};

use crate::error::{ExecutionError, ExecutionResult};

/// Execution defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Validate every operation before executing any
    pub validate_first_default: bool,

    /// Largest document the store reads or writes
    pub max_content_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            validate_first_default: true,
            max_content_bytes: FileSystemDocumentStore::DEFAULT_MAX_CONTENT_BYTES,
        }
    }
}

/// Rollback defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackConfig {
    /// Skip documents edited after the execution
    pub preserve_manual_changes_default: bool,

    /// Restore documents rather than only analysing them
    pub restore_snapshot_default: bool,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            preserve_manual_changes_default: true,
            restore_snapshot_default: true,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Storage directory; relative paths resolve against the workspace
    pub storage_dir: PathBuf,

    /// Execution settings
    pub execution: ExecutionConfig,

    /// Rollback settings
    pub rollback: RollbackConfig,

    /// Confidence threshold tuning
    pub learning: LearningConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(StorageLayout::DEFAULT_DIR),
            execution: ExecutionConfig::default(),
            rollback: RollbackConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> ExecutionResult<Self> {
        let path = path.as_ref();
        let config: PipelineConfig = ConfigLoader::load_from_file(path)?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ExecutionResult<()> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ExecutionError::ConfigurationError(
                "storage_dir must not be empty".to_string(),
            ));
        }

        if self.execution.max_content_bytes == 0 {
            return Err(ExecutionError::ConfigurationError(
                "execution.max_content_bytes must be greater than 0".to_string(),
            ));
        }

        self.learning.validate()?;
        Ok(())
    }

    /// Storage layout for a workspace rooted at `workspace`
    pub fn layout_for(&self, workspace: &Path) -> StorageLayout {
        if self.storage_dir.is_absolute() {
            StorageLayout::new(&self.storage_dir)
        } else {
            StorageLayout::new(workspace.join(&self.storage_dir))
        }
    }
}
