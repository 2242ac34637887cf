//! Tolerant JSON history documents
//!
//! Audit state (rollbacks, executions, approvals, feedback) is persisted as a
//! single JSON document per history:
//!
//! ```json
//! { "last_updated": "2026-10-18T10:00:00Z", "rollbacks": { "<id>": { ... } } }
//! ```
//!
//! Loading never fails. Each record is deserialized on its own and a record
//! that does not validate is dropped with a warning. A document that is not
//! valid JSON at all yields an empty history. Saving rewrites the whole
//! document through a temp file and a rename.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{IoOperation, StorageError, StorageResult};

/// Outcome of loading a history document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Number of records read successfully
    pub loaded_records: usize,
    /// Number of records dropped because they failed validation
    pub dropped_records: usize,
    /// Whether the document as a whole was unreadable
    pub document_corrupted: bool,
}

/// JSON document holding records keyed by id
#[derive(Debug, Clone)]
pub struct KeyedHistoryFile<T> {
    path: PathBuf,
    collection: &'static str,
    _marker: PhantomData<T>,
}

impl<T> KeyedHistoryFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a handle for the document at `path` storing records under `collection`
    pub fn new(path: impl Into<PathBuf>, collection: &'static str) -> Self {
        Self {
            path: path.into(),
            collection,
            _marker: PhantomData,
        }
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every valid record
    pub async fn load(&self) -> (BTreeMap<String, T>, LoadReport) {
        let mut records = BTreeMap::new();
        let mut report = LoadReport::default();

        let Some(entries) = read_collection(&self.path, self.collection, &mut report).await else {
            return (records, report);
        };

        let Value::Object(map) = entries else {
            warn!(
                path = %self.path.display(),
                collection = self.collection,
                "History collection is not an object, starting with empty history"
            );
            report.document_corrupted = true;
            return (records, report);
        };

        for (id, raw) in map {
            match serde_json::from_value::<T>(raw) {
                Ok(record) => {
                    records.insert(id, record);
                    report.loaded_records += 1;
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        record_id = %id,
                        error = %e,
                        "Dropping invalid history record"
                    );
                    report.dropped_records += 1;
                }
            }
        }

        debug!(
            path = %self.path.display(),
            loaded = report.loaded_records,
            dropped = report.dropped_records,
            "Loaded keyed history"
        );
        (records, report)
    }

    /// Rewrite the whole document with `records`
    pub async fn save(&self, records: &BTreeMap<String, T>) -> StorageResult<()> {
        let mut collection = Map::new();
        for (id, record) in records {
            collection.insert(id.clone(), serde_json::to_value(record)?);
        }
        write_document(&self.path, self.collection, Value::Object(collection)).await
    }
}

/// JSON document holding an ordered list of records
#[derive(Debug, Clone)]
pub struct ListHistoryFile<T> {
    path: PathBuf,
    collection: &'static str,
    _marker: PhantomData<T>,
}

impl<T> ListHistoryFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a handle for the document at `path` storing records under `collection`
    pub fn new(path: impl Into<PathBuf>, collection: &'static str) -> Self {
        Self {
            path: path.into(),
            collection,
            _marker: PhantomData,
        }
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every valid record, preserving order
    pub async fn load(&self) -> (Vec<T>, LoadReport) {
        let mut records = Vec::new();
        let mut report = LoadReport::default();

        let Some(entries) = read_collection(&self.path, self.collection, &mut report).await else {
            return (records, report);
        };

        let Value::Array(items) = entries else {
            warn!(
                path = %self.path.display(),
                collection = self.collection,
                "History collection is not an array, starting with empty history"
            );
            report.document_corrupted = true;
            return (records, report);
        };

        for (index, raw) in items.into_iter().enumerate() {
            match serde_json::from_value::<T>(raw) {
                Ok(record) => {
                    records.push(record);
                    report.loaded_records += 1;
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        index,
                        error = %e,
                        "Dropping invalid history record"
                    );
                    report.dropped_records += 1;
                }
            }
        }

        (records, report)
    }

    /// Rewrite the whole document with `records`
    pub async fn save(&self, records: &[T]) -> StorageResult<()> {
        let items = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        write_document(&self.path, self.collection, Value::Array(items)).await
    }
}

/// Read the document and return the value stored under `collection`
///
/// Returns `None` when there is nothing usable; `report` records whether the
/// document was corrupted.
async fn read_collection(
    path: &Path,
    collection: &str,
    report: &mut LoadReport,
) -> Option<Value> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read history, starting empty");
            report.document_corrupted = true;
            return None;
        }
    };

    let document: Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "History document is not valid JSON, starting with empty history"
            );
            report.document_corrupted = true;
            return None;
        }
    };

    match document {
        Value::Object(mut root) => match root.remove(collection) {
            Some(entries) => Some(entries),
            None => {
                debug!(path = %path.display(), collection, "History document has no records yet");
                None
            }
        },
        _ => {
            warn!(path = %path.display(), "History document root is not an object");
            report.document_corrupted = true;
            None
        }
    }
}

async fn write_document(path: &Path, collection: &str, entries: Value) -> StorageResult<()> {
    let mut root = Map::new();
    root.insert(
        "last_updated".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    root.insert(collection.to_string(), entries);

    let json = serde_json::to_string_pretty(&Value::Object(root))?;
    write_atomic(path, &json).await
}

/// Write `content` to a temp file next to `path` and rename it into place
pub async fn write_atomic(path: &Path, content: &str) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::directory_creation_failed(parent.to_path_buf(), e))?;
        }
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");
    let temp_path = path.with_file_name(format!(".tmp-{}-{}", Uuid::new_v4(), file_name));

    fs::write(&temp_path, content)
        .await
        .map_err(|e| StorageError::io_error(temp_path.clone(), IoOperation::Write, e))?;

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(StorageError::io_error(path.to_path_buf(), IoOperation::Rename, e));
    }

    Ok(())
}
