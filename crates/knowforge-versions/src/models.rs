//! Version history data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Description prefix written on pre-refactoring snapshots
pub const PRE_REFACTORING_PREFIX: &str = "Pre-refactoring snapshot: ";

/// Why a version was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// First version of a document
    Initial,
    /// Ordinary edit outside the refactoring pipeline
    Update,
    /// Pre-image captured before a refactoring touched the document
    PreRefactoring,
    /// State produced by a refactoring operation
    Refactoring,
    /// Copy of a conflicting document taken before a rollback skipped it
    ManualBackup,
    /// Forward version created by rolling back to an earlier version
    Rollback,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Initial => write!(f, "initial"),
            ChangeType::Update => write!(f, "update"),
            ChangeType::PreRefactoring => write!(f, "pre_refactoring"),
            ChangeType::Refactoring => write!(f, "refactoring"),
            ChangeType::ManualBackup => write!(f, "manual_backup"),
            ChangeType::Rollback => write!(f, "rollback"),
        }
    }
}

fn default_exists() -> bool {
    true
}

/// Metadata of one version of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Version number, starting at 1 with no gaps
    pub version: u64,
    /// When the version was recorded
    pub timestamp: DateTime<Utc>,
    /// Why the version was recorded
    pub change_type: ChangeType,
    /// Human-readable description
    pub change_description: String,
    /// SHA-256 of the content; empty for a tombstone
    pub content_hash: String,
    /// Content size in bytes
    pub size_bytes: u64,
    /// Token count of the content
    pub token_count: usize,
    /// Refactoring snapshot this version belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    /// False when the document did not exist at this point
    #[serde(default = "default_exists")]
    pub exists: bool,
}

impl VersionMetadata {
    /// Whether this entry is the pre-image captured for `snapshot_id`.
    ///
    /// Entries without a structured snapshot id fall back to the description
    /// prefix, but only when they were recorded as pre-refactoring snapshots.
    pub fn is_pre_image_of(&self, snapshot_id: &str) -> bool {
        if self.change_type != ChangeType::PreRefactoring {
            return false;
        }
        match &self.snapshot_id {
            Some(id) => id == snapshot_id,
            None => {
                let expected = format!("{}{}", PRE_REFACTORING_PREFIX, snapshot_id);
                self.change_description == expected
                    || self
                        .change_description
                        .strip_prefix(&expected)
                        .is_some_and(|rest| rest.starts_with(' '))
            }
        }
    }
}

/// A stored version: metadata plus content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Version metadata
    #[serde(flatten)]
    pub metadata: VersionMetadata,
    /// Document content; `None` for a tombstone
    #[serde(default)]
    pub content: Option<String>,
    /// Document the version belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Request to append a version to a document's history
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    /// Document path
    pub path: String,
    /// Content to record; `None` records a tombstone
    pub content: Option<String>,
    /// Token count of `content`
    pub token_count: usize,
    /// Why the version is recorded
    pub change_type: ChangeType,
    /// Human-readable description
    pub change_description: String,
    /// Refactoring snapshot this version belongs to
    pub snapshot_id: Option<String>,
}

impl SnapshotRequest {
    /// Request a version holding `content`
    pub fn content(
        path: impl Into<String>,
        content: impl Into<String>,
        change_type: ChangeType,
        change_description: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: Some(content.into()),
            token_count: 0,
            change_type,
            change_description: change_description.into(),
            snapshot_id: None,
        }
    }

    /// Request a tombstone recording that the document did not exist
    pub fn tombstone(
        path: impl Into<String>,
        change_type: ChangeType,
        change_description: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: None,
            token_count: 0,
            change_type,
            change_description: change_description.into(),
            snapshot_id: None,
        }
    }

    /// Pre-image snapshot of a document before refactoring `snapshot_id` touches it
    pub fn pre_refactoring(
        path: impl Into<String>,
        content: Option<String>,
        snapshot_id: impl Into<String>,
    ) -> Self {
        let snapshot_id = snapshot_id.into();
        Self {
            path: path.into(),
            content,
            token_count: 0,
            change_type: ChangeType::PreRefactoring,
            change_description: format!("{}{}", PRE_REFACTORING_PREFIX, snapshot_id),
            snapshot_id: Some(snapshot_id),
        }
    }

    /// Set the token count
    pub fn with_token_count(mut self, token_count: usize) -> Self {
        self.token_count = token_count;
        self
    }

    /// Tag the version with a refactoring snapshot id
    pub fn with_snapshot_id(mut self, snapshot_id: impl Into<String>) -> Self {
        self.snapshot_id = Some(snapshot_id.into());
        self
    }
}

/// Result of rolling a document back to an earlier version
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    /// Document path
    pub path: String,
    /// Version that was restored
    pub restored_version: u64,
    /// New forward version recording the rollback
    pub new_version: VersionMetadata,
    /// Content to put back; `None` when the document should not exist
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(change_type: ChangeType, description: &str, snapshot_id: Option<&str>) -> VersionMetadata {
        VersionMetadata {
            version: 1,
            timestamp: Utc::now(),
            change_type,
            change_description: description.to_string(),
            content_hash: String::new(),
            size_bytes: 0,
            token_count: 0,
            snapshot_id: snapshot_id.map(str::to_string),
            exists: true,
        }
    }

    #[test]
    fn test_structured_snapshot_id_match() {
        let entry = metadata(
            ChangeType::PreRefactoring,
            "Pre-refactoring snapshot: refactoring-1",
            Some("refactoring-1"),
        );
        assert!(entry.is_pre_image_of("refactoring-1"));
        assert!(!entry.is_pre_image_of("refactoring-2"));
    }

    #[test]
    fn test_structured_id_wins_over_description() {
        let entry = metadata(
            ChangeType::PreRefactoring,
            "Pre-refactoring snapshot: refactoring-1",
            Some("refactoring-2"),
        );
        assert!(!entry.is_pre_image_of("refactoring-1"));
    }

    #[test]
    fn test_legacy_description_fallback() {
        let entry = metadata(
            ChangeType::PreRefactoring,
            "Pre-refactoring snapshot: refactoring-1",
            None,
        );
        assert!(entry.is_pre_image_of("refactoring-1"));
        assert!(!entry.is_pre_image_of("refactoring-"));
    }

    #[test]
    fn test_user_description_with_prefix_is_ignored() {
        let entry = metadata(
            ChangeType::Update,
            "Pre-refactoring snapshot: refactoring-1",
            None,
        );
        assert!(!entry.is_pre_image_of("refactoring-1"));
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = VersionRecord {
            metadata: metadata(ChangeType::Initial, "first", None),
            content: Some("body".to_string()),
            path: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["change_type"], "initial");
        assert_eq!(value["content"], "body");
        assert!(value.get("snapshot_id").is_none());

        let back: VersionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_missing_exists_defaults_true() {
        let json = serde_json::json!({
            "version": 3,
            "timestamp": "2026-01-01T00:00:00Z",
            "change_type": "update",
            "change_description": "edit",
            "content_hash": "abc",
            "size_bytes": 4,
            "token_count": 1
        });
        let entry: VersionMetadata = serde_json::from_value(json).unwrap();
        assert!(entry.exists);
        assert_eq!(entry.snapshot_id, None);
    }
}
