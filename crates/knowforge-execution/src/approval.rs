//! Approval management for refactoring suggestions
//!
//! Every decision creates a new [`Approval`]; earlier decisions are kept for
//! audit. The only in-place change is the `approved -> applied` transition
//! made when an execution consumes an approval.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use knowforge_storage::{KeyedHistoryFile, LoadReport};

use crate::error::{ExecutionError, ExecutionResult};
use crate::ids::next_timestamp;
use crate::models::{Approval, ApprovalStatus};

/// Tracks approval decisions per suggestion
pub struct ApprovalManager {
    /// Approvals in creation order
    approvals: RwLock<Vec<Approval>>,
    /// Backing document, if persisted
    file: Option<KeyedHistoryFile<Approval>>,
}

impl Default for ApprovalManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ApprovalManager {
    const COLLECTION: &'static str = "approvals";

    /// Manager that keeps approvals in memory only
    pub fn in_memory() -> Self {
        Self {
            approvals: RwLock::new(Vec::new()),
            file: None,
        }
    }

    /// Open the approvals persisted at `path`
    pub async fn open(path: impl Into<PathBuf>) -> (Self, LoadReport) {
        let file = KeyedHistoryFile::new(path, Self::COLLECTION);
        let (records, report) = file.load().await;

        let mut approvals: Vec<Approval> = records.into_values().collect();
        approvals.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.approval_id.cmp(&b.approval_id))
        });

        if report.dropped_records > 0 || report.document_corrupted {
            warn!(
                path = %file.path().display(),
                dropped = report.dropped_records,
                corrupted = report.document_corrupted,
                "Approval history partially unreadable"
            );
        }

        let manager = Self {
            approvals: RwLock::new(approvals),
            file: Some(file),
        };
        (manager, report)
    }

    async fn persist(&self, approvals: &[Approval]) -> ExecutionResult<()> {
        if let Some(file) = &self.file {
            let keyed: BTreeMap<String, Approval> = approvals
                .iter()
                .map(|a| (a.approval_id.clone(), a.clone()))
                .collect();
            file.save(&keyed).await?;
        }
        Ok(())
    }

    async fn record(
        &self,
        suggestion_id: &str,
        status: ApprovalStatus,
        comment: Option<String>,
        auto_apply: bool,
    ) -> ExecutionResult<Approval> {
        if suggestion_id.trim().is_empty() {
            return Err(ExecutionError::MissingParameter("suggestion_id".to_string()));
        }

        let now = next_timestamp();
        let approval = Approval {
            approval_id: format!("approval-{}", Uuid::new_v4()),
            suggestion_id: suggestion_id.to_string(),
            status,
            comment,
            auto_apply,
            execution_id: None,
            created_at: now,
            updated_at: now,
        };

        let mut approvals = self.approvals.write().await;
        let mut updated = approvals.clone();
        updated.push(approval.clone());
        self.persist(&updated).await?;
        *approvals = updated;

        info!(
            suggestion_id = %suggestion_id,
            approval_id = %approval.approval_id,
            status = %status,
            auto_apply,
            "Approval decision recorded"
        );
        Ok(approval)
    }

    /// Approve a suggestion
    pub async fn approve(
        &self,
        suggestion_id: &str,
        comment: Option<String>,
        auto_apply: bool,
    ) -> ExecutionResult<Approval> {
        self.record(suggestion_id, ApprovalStatus::Approved, comment, auto_apply)
            .await
    }

    /// Reject a suggestion
    pub async fn reject(&self, suggestion_id: &str, comment: Option<String>) -> ExecutionResult<Approval> {
        self.record(suggestion_id, ApprovalStatus::Rejected, comment, false)
            .await
    }

    /// Every approval for a suggestion, in creation order
    pub async fn get_approvals_for(&self, suggestion_id: &str) -> Vec<Approval> {
        self.approvals
            .read()
            .await
            .iter()
            .filter(|a| a.suggestion_id == suggestion_id)
            .cloned()
            .collect()
    }

    /// Look up one approval
    pub async fn get_approval(&self, approval_id: &str) -> Option<Approval> {
        self.approvals
            .read()
            .await
            .iter()
            .find(|a| a.approval_id == approval_id)
            .cloned()
    }

    /// Approval an execution of `suggestion_id` may run under.
    ///
    /// An explicit `approval_id` must exist, belong to the suggestion and be
    /// `approved`. Without one, the earliest `approved` approval is used.
    pub async fn find_usable_approval(
        &self,
        suggestion_id: &str,
        approval_id: Option<&str>,
    ) -> ExecutionResult<Approval> {
        let approvals = self.approvals.read().await;

        if let Some(approval_id) = approval_id {
            let approval = approvals
                .iter()
                .find(|a| a.approval_id == approval_id)
                .ok_or_else(|| ExecutionError::ApprovalNotFound(approval_id.to_string()))?;

            if approval.suggestion_id != suggestion_id {
                return Err(ExecutionError::ValidationError(format!(
                    "Approval {} belongs to suggestion {}, not {}",
                    approval_id, approval.suggestion_id, suggestion_id
                )));
            }

            return match approval.status {
                ApprovalStatus::Approved => Ok(approval.clone()),
                ApprovalStatus::Applied => Err(ExecutionError::ValidationError(format!(
                    "Approval {} was already applied by execution {}; approve the suggestion again to re-run it",
                    approval_id,
                    approval.execution_id.as_deref().unwrap_or("unknown")
                ))),
                status => Err(ExecutionError::ValidationError(format!(
                    "Approval {} is {}, not approved",
                    approval_id, status
                ))),
            };
        }

        approvals
            .iter()
            .find(|a| a.suggestion_id == suggestion_id && a.status == ApprovalStatus::Approved)
            .cloned()
            .ok_or_else(|| {
                ExecutionError::ValidationError(format!(
                    "Suggestion {} has no usable approval; approve it first",
                    suggestion_id
                ))
            })
    }

    /// Mark an approved approval as applied by `execution_id`.
    ///
    /// Unknown approvals and illegal transitions are logged and ignored.
    /// Returns whether the approval was updated.
    pub async fn mark_as_applied(&self, approval_id: &str, execution_id: &str) -> bool {
        let mut approvals = self.approvals.write().await;

        let Some(index) = approvals.iter().position(|a| a.approval_id == approval_id) else {
            warn!(
                approval_id = %approval_id,
                execution_id = %execution_id,
                "Cannot mark unknown approval as applied"
            );
            return false;
        };

        if approvals[index].status != ApprovalStatus::Approved {
            warn!(
                approval_id = %approval_id,
                execution_id = %execution_id,
                status = %approvals[index].status,
                "Only approved approvals can be marked as applied"
            );
            return false;
        }

        let mut updated = approvals.clone();
        updated[index].status = ApprovalStatus::Applied;
        updated[index].execution_id = Some(execution_id.to_string());
        updated[index].updated_at = next_timestamp();

        if let Err(e) = self.persist(&updated).await {
            error!(
                approval_id = %approval_id,
                error = %e,
                "Failed to persist applied approval; keeping it in memory"
            );
        }
        *approvals = updated;

        debug!(approval_id = %approval_id, execution_id = %execution_id, "Approval marked as applied");
        true
    }
}
