//! Version store port and its JSON-backed implementation
//!
//! Each document has one history file under the versions directory holding
//! `{"last_updated": ..., "versions": [...]}`. Versions are only ever
//! appended; a rollback records a new forward version.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use knowforge_files::{ContentHasher, DocumentPath};
use knowforge_storage::ListHistoryFile;

use crate::error::{VersionError, VersionResult};
use crate::models::{ChangeType, SnapshotInfo, SnapshotRequest, VersionMetadata, VersionRecord};

/// Per-document append-only version history
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Append a version; the store assigns the next version number
    async fn create_snapshot(&self, request: SnapshotRequest) -> VersionResult<VersionMetadata>;

    /// Metadata of every version of `path`, oldest first; empty when untracked
    async fn get_history(&self, path: &str) -> VersionResult<Vec<VersionMetadata>>;

    /// One stored version including its content
    async fn get_version(&self, path: &str, version: u64) -> VersionResult<Option<VersionRecord>>;

    /// Record a new forward version equal to `version`.
    ///
    /// Returns `None` when `version` is not part of `history`.
    async fn rollback_to_version(
        &self,
        path: &str,
        history: &[VersionMetadata],
        version: u64,
    ) -> VersionResult<Option<SnapshotInfo>>;

    /// Every document path with at least one version
    async fn tracked_paths(&self) -> VersionResult<Vec<String>>;
}

/// Version store persisting one JSON history per document
///
/// ```rust
/// use knowforge_versions::{ChangeType, FileVersionStore, SnapshotRequest, VersionStore};
///
/// # tokio_test::block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// let store = FileVersionStore::new(dir.path());
///
/// store
///     .create_snapshot(SnapshotRequest::content("a.md", "one", ChangeType::Initial, "created"))
///     .await
///     .unwrap();
/// store
///     .create_snapshot(SnapshotRequest::content("a.md", "two", ChangeType::Update, "edited"))
///     .await
///     .unwrap();
///
/// let history = store.get_history("a.md").await.unwrap();
/// let restored = store.rollback_to_version("a.md", &history, 1).await.unwrap().unwrap();
/// assert_eq!(restored.content.as_deref(), Some("one"));
/// assert_eq!(restored.new_version.version, 3);
/// # });
/// ```
pub struct FileVersionStore {
    versions_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileVersionStore {
    const COLLECTION: &'static str = "versions";

    /// Create a store keeping histories in `versions_dir`
    pub fn new(versions_dir: impl Into<PathBuf>) -> Self {
        Self {
            versions_dir: versions_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn history_file(&self, path: &str) -> VersionResult<(String, ListHistoryFile<VersionRecord>)> {
        let normalized = DocumentPath::normalize(path)?;
        let file_name = format!("{}.json", history_file_stem(&normalized));
        let file = ListHistoryFile::new(self.versions_dir.join(file_name), Self::COLLECTION);
        Ok((normalized, file))
    }

    async fn load_records(&self, path: &str) -> VersionResult<(String, Vec<VersionRecord>)> {
        let (normalized, file) = self.history_file(path)?;
        let (records, report) = file.load().await;
        if report.dropped_records > 0 || report.document_corrupted {
            warn!(
                path = %normalized,
                dropped = report.dropped_records,
                corrupted = report.document_corrupted,
                "Version history partially unreadable"
            );
        }
        Ok((normalized, records))
    }

    async fn append(&self, request: SnapshotRequest) -> VersionResult<VersionMetadata> {
        let _guard = self.write_lock.lock().await;

        let (normalized, file) = self.history_file(&request.path)?;
        let (mut records, report) = file.load().await;
        if report.document_corrupted {
            warn!(
                path = %normalized,
                file = %file.path().display(),
                "Refusing to append to an unreadable version history"
            );
            return Err(VersionError::CorruptHistory {
                path: normalized,
                file: file.path().display().to_string(),
            });
        }

        let next_version = records
            .iter()
            .map(|r| r.metadata.version)
            .max()
            .unwrap_or(0)
            + 1;

        let (content_hash, size_bytes, exists) = match &request.content {
            Some(content) => (
                ContentHasher::compute_hash(content),
                content.len() as u64,
                true,
            ),
            None => (String::new(), 0, false),
        };

        let metadata = VersionMetadata {
            version: next_version,
            timestamp: Utc::now(),
            change_type: request.change_type,
            change_description: request.change_description,
            content_hash,
            size_bytes,
            token_count: request.token_count,
            snapshot_id: request.snapshot_id,
            exists,
        };

        records.push(VersionRecord {
            metadata: metadata.clone(),
            content: request.content,
            path: Some(normalized.clone()),
        });
        file.save(&records).await?;

        debug!(
            path = %normalized,
            version = metadata.version,
            change_type = %metadata.change_type,
            exists = metadata.exists,
            "Version recorded"
        );
        Ok(metadata)
    }

    /// Document path stored inside a history file
    async fn recorded_path(&self, file: PathBuf) -> Option<String> {
        let (records, _) = ListHistoryFile::<VersionRecord>::new(file, Self::COLLECTION)
            .load()
            .await;
        records.into_iter().find_map(|r| r.path)
    }
}

#[async_trait]
impl VersionStore for FileVersionStore {
    async fn create_snapshot(&self, request: SnapshotRequest) -> VersionResult<VersionMetadata> {
        self.append(request).await
    }

    async fn get_history(&self, path: &str) -> VersionResult<Vec<VersionMetadata>> {
        let (_, records) = self.load_records(path).await?;
        Ok(records.into_iter().map(|r| r.metadata).collect())
    }

    async fn get_version(&self, path: &str, version: u64) -> VersionResult<Option<VersionRecord>> {
        let (_, records) = self.load_records(path).await?;
        Ok(records.into_iter().find(|r| r.metadata.version == version))
    }

    async fn rollback_to_version(
        &self,
        path: &str,
        history: &[VersionMetadata],
        version: u64,
    ) -> VersionResult<Option<SnapshotInfo>> {
        if !history.iter().any(|m| m.version == version) {
            debug!(path = %path, version, "Version not in supplied history");
            return Ok(None);
        }

        let Some(target) = self.get_version(path, version).await? else {
            warn!(path = %path, version, "Version listed in history but not stored");
            return Ok(None);
        };

        let description = format!("Rolled back to version {}", version);
        let request = SnapshotRequest {
            path: path.to_string(),
            content: target.content.clone(),
            token_count: target.metadata.token_count,
            change_type: ChangeType::Rollback,
            change_description: description,
            snapshot_id: None,
        };
        let new_version = self.append(request).await?;

        info!(
            path = %path,
            restored_version = version,
            new_version = new_version.version,
            "Rolled back document history"
        );

        Ok(Some(SnapshotInfo {
            path: DocumentPath::normalize(path)?,
            restored_version: version,
            new_version,
            content: target.content,
        }))
    }

    async fn tracked_paths(&self) -> VersionResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.versions_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VersionError::IoError(e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            let path = if stem.contains(HASHED_NAME_MARKER) {
                self.recorded_path(entry.path()).await
            } else {
                decode_path(stem)
            };
            match path {
                Some(path) => paths.push(path),
                None => warn!(file = %name, "Skipping version file with undecodable name"),
            }
        }

        paths.sort();
        Ok(paths)
    }
}

/// Longest encoded path used verbatim as a file name stem
const MAX_ENCODED_LEN: usize = 160;

/// Leading part of the encoded path kept in a hashed stem
const HASHED_PREFIX_LEN: usize = 64;

/// Separates the readable prefix from the hash in a hashed stem; never
/// produced by [`encode_path`]
const HASHED_NAME_MARKER: char = '~';

/// File name stem of a document's history.
///
/// Long paths become `{prefix}~{sha256}`; the original path is then only
/// recoverable from the records inside the file.
fn history_file_stem(path: &str) -> String {
    let encoded = encode_path(path);
    if encoded.len() <= MAX_ENCODED_LEN {
        return encoded;
    }
    // Encoded names are ASCII, so any byte offset is a char boundary
    format!(
        "{}{}{}",
        &encoded[..HASHED_PREFIX_LEN],
        HASHED_NAME_MARKER,
        ContentHasher::compute_hash(path)
    )
}

/// Encode a document path as a single file name
fn encode_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for (index, byte) in path.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || byte == b'_'
            || (byte == b'.' && index > 0);
        if keep {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn decode_path(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
