/// Append-only log of feedback records
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use knowforge_storage::{ListHistoryFile, LoadReport};

use crate::error::Result;
use crate::models::FeedbackRecord;

/// Feedback records in arrival order, optionally persisted to disk
#[derive(Clone)]
pub struct FeedbackLog {
    records: Arc<RwLock<Vec<FeedbackRecord>>>,
    file: Option<ListHistoryFile<FeedbackRecord>>,
}

impl FeedbackLog {
    const COLLECTION: &'static str = "feedback";

    /// Log kept only in memory
    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            file: None,
        }
    }

    /// Open the log persisted at `path`, loading every valid record
    pub async fn open(path: impl Into<PathBuf>) -> (Self, LoadReport) {
        let file = ListHistoryFile::new(path, Self::COLLECTION);
        let (records, report) = file.load().await;
        if report.dropped_records > 0 || report.document_corrupted {
            warn!(
                path = %file.path().display(),
                dropped = report.dropped_records,
                corrupted = report.document_corrupted,
                "Feedback log partially unreadable"
            );
        }

        let log = Self {
            records: Arc::new(RwLock::new(records)),
            file: Some(file),
        };
        (log, report)
    }

    /// Append a record; the record is kept only if persisting succeeds
    pub async fn append(&self, record: FeedbackRecord) -> Result<()> {
        let mut records = self.records.write().await;

        if let Some(file) = &self.file {
            let mut updated = records.clone();
            updated.push(record.clone());
            file.save(&updated).await?;
        }

        debug!(
            feedback_id = %record.feedback_id,
            suggestion_id = %record.suggestion_id,
            feedback_type = %record.feedback_type,
            "Feedback appended"
        );
        records.push(record);
        Ok(())
    }

    /// All records in arrival order
    pub async fn records(&self) -> Vec<FeedbackRecord> {
        self.records.read().await.clone()
    }

    /// Records for one suggestion, in arrival order
    pub async fn records_for_suggestion(&self, suggestion_id: &str) -> Vec<FeedbackRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.suggestion_id == suggestion_id)
            .cloned()
            .collect()
    }

    /// Number of records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the log is empty
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
