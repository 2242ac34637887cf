//! Rollback of executed refactorings
//!
//! A rollback locates the pre-images an execution recorded, checks each
//! affected document for edits made after the execution, and restores the
//! documents that are safe to restore. Documents edited externally are backed
//! up and skipped. One document failing never stops the others.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use knowforge_files::{DocumentError, DocumentStore, TokenCounter};
use knowforge_versions::{ChangeType, SnapshotRequest, VersionMetadata, VersionStore};

use crate::error::{ExecutionError, ExecutionResult};
use crate::history::RollbackHistory;
use crate::ids::{find_snapshot_for_execution, next_timestamp, rollback_id};
use crate::models::{RollbackConflict, RollbackFailure, RollbackRecord, RollbackStatus};

/// Parameters of a rollback request
#[derive(Debug, Clone)]
pub struct RollbackRequest {
    /// Execution to roll back
    pub execution_id: String,
    /// Whether to restore documents at all
    pub restore_snapshot: bool,
    /// Whether to protect documents edited after the execution
    pub preserve_manual_changes: bool,
    /// Whether to analyse only
    pub dry_run: bool,
}

impl RollbackRequest {
    /// Restore `execution_id`, protecting manual edits
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            restore_snapshot: true,
            preserve_manual_changes: true,
            dry_run: false,
        }
    }
}

/// A document with a pre-image in the rolled back snapshot
#[derive(Debug, Clone)]
pub struct AffectedFile {
    /// Document path
    pub path: String,
    /// Pre-image entry recorded by the execution
    pub pre_image: VersionMetadata,
    /// Most recent entry in the document's history
    pub latest: VersionMetadata,
    /// Full history at analysis time
    pub history: Vec<VersionMetadata>,
}

/// Rolls executions back to their pre-images
pub struct RollbackManager {
    documents: Arc<dyn DocumentStore>,
    versions: Arc<dyn VersionStore>,
    tokens: Arc<dyn TokenCounter>,
    history: Arc<RollbackHistory>,
}

impl RollbackManager {
    /// Create a rollback manager
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        versions: Arc<dyn VersionStore>,
        tokens: Arc<dyn TokenCounter>,
        history: Arc<RollbackHistory>,
    ) -> Self {
        Self {
            documents,
            versions,
            tokens,
            history,
        }
    }

    /// Rollback history
    pub fn history(&self) -> &RollbackHistory {
        &self.history
    }

    /// Snapshot id recorded by `execution_id`
    pub fn find_snapshot_for_execution(&self, execution_id: &str) -> Option<String> {
        find_snapshot_for_execution(execution_id)
    }

    /// Every document holding a pre-image for `snapshot_id`
    pub async fn get_affected_files(
        &self,
        execution_id: &str,
        snapshot_id: &str,
    ) -> ExecutionResult<Vec<AffectedFile>> {
        let mut affected = Vec::new();

        for path in self.versions.tracked_paths().await? {
            let history = self.versions.get_history(&path).await?;
            let Some(pre_image) = history.iter().find(|m| m.is_pre_image_of(snapshot_id)).cloned() else {
                continue;
            };
            let Some(latest) = history.last().cloned() else {
                continue;
            };
            affected.push(AffectedFile {
                path,
                pre_image,
                latest,
                history,
            });
        }

        debug!(
            execution_id = %execution_id,
            snapshot_id = %snapshot_id,
            affected = affected.len(),
            "Located affected documents"
        );
        Ok(affected)
    }

    /// Current state of a document: `None` if absent, else its hash
    async fn current_hash(&self, path: &str) -> ExecutionResult<Option<(String, String)>> {
        match self.documents.read(path).await {
            Ok(doc) => Ok(Some((doc.content_hash, doc.content))),
            Err(DocumentError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `current` is the state recorded by `entry`
    fn matches(entry: &VersionMetadata, current: Option<&str>) -> bool {
        match current {
            Some(hash) => entry.exists && hash == entry.content_hash,
            None => !entry.exists,
        }
    }

    /// Reason the document conflicts with its recorded state, if it does.
    ///
    /// A document already back at its pre-image is not a conflict; that is
    /// the state a restore interrupted after its write leaves behind.
    fn conflict_reason(file: &AffectedFile, current: Option<&str>) -> Option<String> {
        if Self::matches(&file.latest, current) || Self::matches(&file.pre_image, current) {
            return None;
        }
        Some(
            match (file.latest.exists, current) {
                (true, None) => "deleted after refactoring",
                (false, Some(_)) => "created after refactoring",
                _ => "modified after refactoring",
            }
            .to_string(),
        )
    }

    async fn backup_current(&self, path: &str, current: Option<String>, rollback_id: &str) -> ExecutionResult<u64> {
        let description = format!("Manual changes preserved before {}", rollback_id);
        let request = match current {
            Some(content) => {
                let tokens = self.tokens.count(&content);
                SnapshotRequest::content(path, content, ChangeType::ManualBackup, description)
                    .with_token_count(tokens)
            }
            None => SnapshotRequest::tombstone(path, ChangeType::ManualBackup, description),
        };
        Ok(self.versions.create_snapshot(request).await?.version)
    }

    /// Put the pre-image back on disk, then record the rollback version.
    ///
    /// The history only gains a `rollback` entry once the document matches it.
    async fn restore_file(&self, file: &AffectedFile) -> ExecutionResult<()> {
        let pre_image = self
            .versions
            .get_version(&file.path, file.pre_image.version)
            .await?
            .ok_or_else(|| {
                ExecutionError::ValidationError(format!(
                    "Pre-image version {} of {} is missing",
                    file.pre_image.version, file.path
                ))
            })?;

        match &pre_image.content {
            Some(content) => {
                self.documents.write(&file.path, content).await?;
            }
            None => {
                if self.documents.exists(&file.path).await? {
                    self.documents.delete(&file.path).await?;
                }
            }
        }

        self.versions
            .rollback_to_version(&file.path, &file.history, file.pre_image.version)
            .await?
            .ok_or_else(|| {
                ExecutionError::ValidationError(format!(
                    "Pre-image version {} of {} is missing",
                    file.pre_image.version, file.path
                ))
            })?;
        Ok(())
    }

    fn invalid_request(
        &self,
        request: &RollbackRequest,
        rollback_id: String,
        snapshot_id: Option<String>,
        message: String,
        missing_parameter: Option<String>,
    ) -> RollbackRecord {
        warn!(execution_id = %request.execution_id, message = %message, "Rollback rejected");
        RollbackRecord {
            rollback_id,
            execution_id: request.execution_id.clone(),
            snapshot_id,
            created_at: next_timestamp(),
            preserve_manual_edits: request.preserve_manual_changes,
            restore_snapshot: request.restore_snapshot,
            dry_run: request.dry_run,
            status: RollbackStatus::ValidationFailed,
            affected_files: Vec::new(),
            restored_files: Vec::new(),
            conflicts: Vec::new(),
            failed_files: Vec::new(),
            message: Some(message),
            missing_parameter,
        }
    }

    /// Roll back an execution. Never fails; every outcome is in the record.
    ///
    /// Records are persisted unless the request is a dry run or has no
    /// execution id.
    pub async fn rollback(&self, request: RollbackRequest) -> RollbackRecord {
        let started = next_timestamp();

        if request.execution_id.trim().is_empty() {
            return self.invalid_request(
                &request,
                rollback_id("", &started),
                None,
                "execution_id is required".to_string(),
                Some("execution_id".to_string()),
            );
        }

        let rollback_id = rollback_id(&request.execution_id, &started);
        let record = self.run(&request, rollback_id, started).await;

        if !request.dry_run {
            if let Err(e) = self.history.add(record.clone()).await {
                error!(
                    rollback_id = %record.rollback_id,
                    error = %e,
                    "Failed to persist rollback record"
                );
            }
        }
        record
    }

    async fn run(
        &self,
        request: &RollbackRequest,
        rollback_id: String,
        started: chrono::DateTime<chrono::Utc>,
    ) -> RollbackRecord {
        let Some(snapshot_id) = self.find_snapshot_for_execution(&request.execution_id) else {
            return self.invalid_request(
                request,
                rollback_id,
                None,
                format!("{} is not a valid execution id", request.execution_id),
                None,
            );
        };

        let affected = match self.get_affected_files(&request.execution_id, &snapshot_id).await {
            Ok(affected) if affected.is_empty() => {
                return self.invalid_request(
                    request,
                    rollback_id,
                    Some(snapshot_id.clone()),
                    format!("No snapshot {} found for execution {}", snapshot_id, request.execution_id),
                    None,
                );
            }
            Ok(affected) => affected,
            Err(e) => {
                return self.invalid_request(
                    request,
                    rollback_id,
                    Some(snapshot_id),
                    format!("Failed to locate snapshot: {}", e),
                    None,
                );
            }
        };

        info!(
            rollback_id = %rollback_id,
            execution_id = %request.execution_id,
            snapshot_id = %snapshot_id,
            affected = affected.len(),
            dry_run = request.dry_run,
            "Starting rollback"
        );

        let mut record = RollbackRecord {
            rollback_id: rollback_id.clone(),
            execution_id: request.execution_id.clone(),
            snapshot_id: Some(snapshot_id),
            created_at: started,
            preserve_manual_edits: request.preserve_manual_changes,
            restore_snapshot: request.restore_snapshot,
            dry_run: request.dry_run,
            status: RollbackStatus::Success,
            affected_files: affected.iter().map(|f| f.path.clone()).collect(),
            restored_files: Vec::new(),
            conflicts: Vec::new(),
            failed_files: Vec::new(),
            message: None,
            missing_parameter: None,
        };

        let analysis_only = request.dry_run || !request.restore_snapshot;

        for file in &affected {
            let current = if request.preserve_manual_changes {
                match self.current_hash(&file.path).await {
                    Ok(current) => current,
                    Err(e) => {
                        warn!(path = %file.path, error = %e, "Could not read document for conflict check");
                        record.failed_files.push(RollbackFailure {
                            file: file.path.clone(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                }
            } else {
                None
            };

            if request.preserve_manual_changes {
                let hash = current.as_ref().map(|(hash, _)| hash.as_str());
                if let Some(reason) = Self::conflict_reason(file, hash) {
                    warn!(path = %file.path, reason = %reason, "Rollback conflict");
                    let backup_version = if analysis_only {
                        None
                    } else {
                        match self
                            .backup_current(&file.path, current.map(|(_, content)| content), &rollback_id)
                            .await
                        {
                            Ok(version) => Some(version),
                            Err(e) => {
                                error!(path = %file.path, error = %e, "Failed to back up conflicting document");
                                None
                            }
                        }
                    };
                    record.conflicts.push(RollbackConflict {
                        file: file.path.clone(),
                        reason,
                        backup_version,
                    });
                    continue;
                }
            }

            if analysis_only {
                continue;
            }

            match self.restore_file(file).await {
                Ok(()) => {
                    debug!(path = %file.path, version = file.pre_image.version, "Document restored");
                    record.restored_files.push(file.path.clone());
                }
                Err(e) => {
                    error!(path = %file.path, error = %e, "Failed to restore document");
                    record.failed_files.push(RollbackFailure {
                        file: file.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let skipped = record.conflicts.len() + record.failed_files.len();
        record.status = if skipped == 0 {
            RollbackStatus::Success
        } else if analysis_only || !record.restored_files.is_empty() {
            RollbackStatus::Partial
        } else {
            RollbackStatus::Failed
        };

        let restorable = affected.len() - skipped;
        record.message = Some(if request.dry_run {
            format!(
                "Dry run: {} document(s) would be restored, {} conflicted, {} unreadable",
                restorable,
                record.conflicts.len(),
                record.failed_files.len()
            )
        } else if !request.restore_snapshot {
            format!(
                "Analysis only: {} document(s) restorable, {} conflicted",
                restorable,
                record.conflicts.len()
            )
        } else {
            format!(
                "Restored {} of {} document(s); {} conflicted, {} failed",
                record.restored_files.len(),
                affected.len(),
                record.conflicts.len(),
                record.failed_files.len()
            )
        });

        info!(
            rollback_id = %record.rollback_id,
            status = %record.status,
            restored = record.restored_files.len(),
            conflicts = record.conflicts.len(),
            failed = record.failed_files.len(),
            "Rollback finished"
        );
        record
    }
}
