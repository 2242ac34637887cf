//! Persistent execution and rollback histories
//!
//! Both histories are append-only audit trails. Records are loaded eagerly
//! and tolerantly: a corrupted record is dropped, a corrupted document
//! yields an empty history. Saves rewrite the whole document atomically.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use knowforge_storage::{KeyedHistoryFile, ListHistoryFile, LoadReport};

use crate::error::{ExecutionError, ExecutionResult};
use crate::models::{ExecutionRecord, RollbackRecord};

fn report_load(path: &std::path::Path, report: &LoadReport, history: &str) {
    if report.dropped_records > 0 || report.document_corrupted {
        warn!(
            path = %path.display(),
            history,
            dropped = report.dropped_records,
            corrupted = report.document_corrupted,
            "History partially unreadable"
        );
    } else {
        debug!(path = %path.display(), history, loaded = report.loaded_records, "History loaded");
    }
}

/// Every execution attempt, in order
pub struct ExecutionHistory {
    records: RwLock<Vec<ExecutionRecord>>,
    file: Option<ListHistoryFile<ExecutionRecord>>,
    load_report: LoadReport,
}

impl ExecutionHistory {
    const COLLECTION: &'static str = "executions";

    /// History kept in memory only
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            file: None,
            load_report: LoadReport::default(),
        }
    }

    /// Open the history persisted at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let file = ListHistoryFile::new(path, Self::COLLECTION);
        let (records, report) = file.load().await;
        report_load(file.path(), &report, Self::COLLECTION);
        Self {
            records: RwLock::new(records),
            file: Some(file),
            load_report: report,
        }
    }

    /// Outcome of loading the persisted history
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Append a record. Records with an id already present are refused.
    pub async fn append(&self, record: ExecutionRecord) -> ExecutionResult<()> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.execution_id == record.execution_id) {
            return Err(ExecutionError::ValidationError(format!(
                "Execution record {} already exists",
                record.execution_id
            )));
        }

        if let Some(file) = &self.file {
            let mut updated = records.clone();
            updated.push(record.clone());
            file.save(&updated).await?;
        }
        records.push(record);
        Ok(())
    }

    /// Look up an execution
    pub async fn get(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.execution_id == execution_id)
            .cloned()
    }

    /// Every execution, oldest first
    pub async fn all(&self) -> Vec<ExecutionRecord> {
        self.records.read().await.clone()
    }

    /// Executions of one suggestion, oldest first
    pub async fn for_suggestion(&self, suggestion_id: &str) -> Vec<ExecutionRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.suggestion_id == suggestion_id)
            .cloned()
            .collect()
    }
}

/// Rollback records keyed by rollback id
pub struct RollbackHistory {
    records: RwLock<BTreeMap<String, RollbackRecord>>,
    file: Option<KeyedHistoryFile<RollbackRecord>>,
    load_report: LoadReport,
}

impl RollbackHistory {
    const COLLECTION: &'static str = "rollbacks";

    /// History kept in memory only
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            file: None,
            load_report: LoadReport::default(),
        }
    }

    /// Open the history persisted at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let file = KeyedHistoryFile::new(path, Self::COLLECTION);
        let (records, report) = file.load().await;
        report_load(file.path(), &report, Self::COLLECTION);
        Self {
            records: RwLock::new(records),
            file: Some(file),
            load_report: report,
        }
    }

    /// Outcome of loading the persisted history
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Number of records dropped while loading
    pub fn dropped_records(&self) -> usize {
        self.load_report.dropped_records
    }

    /// Store a record and rewrite the history document
    pub async fn add(&self, record: RollbackRecord) -> ExecutionResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.rollback_id) {
            return Err(ExecutionError::ValidationError(format!(
                "Rollback record {} already exists",
                record.rollback_id
            )));
        }

        if let Some(file) = &self.file {
            let mut updated = records.clone();
            updated.insert(record.rollback_id.clone(), record.clone());
            file.save(&updated).await?;
        }
        records.insert(record.rollback_id.clone(), record);
        Ok(())
    }

    /// Look up a rollback
    pub async fn get(&self, rollback_id: &str) -> Option<RollbackRecord> {
        self.records.read().await.get(rollback_id).cloned()
    }

    /// Every rollback, oldest first
    pub async fn all(&self) -> Vec<RollbackRecord> {
        let mut records: Vec<RollbackRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    /// Rollbacks of one execution, oldest first
    pub async fn for_execution(&self, execution_id: &str) -> Vec<RollbackRecord> {
        self.all()
            .await
            .into_iter()
            .filter(|r| r.execution_id == execution_id)
            .collect()
    }
}
