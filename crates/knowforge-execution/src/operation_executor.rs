//! Applies single operations to the document store
//!
//! Before a document is first mutated by an execution its current state is
//! recorded in the version store as a pre-refactoring snapshot (a tombstone
//! if the document did not exist). Every mutation then records the new state
//! as a refactoring version, so the latest version of a document always
//! matches what the pipeline left on disk.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use knowforge_files::{DocumentError, DocumentStore, TokenCounter};
use knowforge_versions::{ChangeType, SnapshotRequest, VersionStore};

use crate::error::ExecutionResult;
use crate::models::{Operation, OperationResult, OperationStatus};
use crate::planner::{plan_operation, FileEffect, WorkingSet};

/// Pre-image bookkeeping for one execution
#[derive(Debug, Clone)]
pub struct SnapshotContext {
    snapshot_id: String,
    captured: HashSet<String>,
    touched_files: Vec<String>,
}

impl SnapshotContext {
    /// Context for the execution owning `snapshot_id`
    pub fn new(snapshot_id: impl Into<String>) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            captured: HashSet::new(),
            touched_files: Vec::new(),
        }
    }

    /// Snapshot id of the execution
    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    /// Documents that received a pre-image, in capture order
    pub fn touched_files(&self) -> &[String] {
        &self.touched_files
    }

    /// Consume the context, returning the touched documents
    pub fn into_touched_files(self) -> Vec<String> {
        self.touched_files
    }
}

/// Executes operations through the document and version stores
pub struct OperationExecutor {
    documents: Arc<dyn DocumentStore>,
    versions: Arc<dyn VersionStore>,
    tokens: Arc<dyn TokenCounter>,
}

impl OperationExecutor {
    /// Create an executor
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        versions: Arc<dyn VersionStore>,
        tokens: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            documents,
            versions,
            tokens,
        }
    }

    async fn current_content(&self, path: &str) -> ExecutionResult<Option<String>> {
        match self.documents.read(path).await {
            Ok(doc) => Ok(Some(doc.content)),
            Err(DocumentError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record the pre-image of `path` unless this execution already did
    async fn capture_pre_image(&self, path: &str, ctx: &mut SnapshotContext) -> ExecutionResult<()> {
        if ctx.captured.contains(path) {
            return Ok(());
        }

        let content = self.current_content(path).await?;
        let token_count = content.as_deref().map(|c| self.tokens.count(c)).unwrap_or(0);
        let metadata = self
            .versions
            .create_snapshot(
                SnapshotRequest::pre_refactoring(path, content, ctx.snapshot_id.clone())
                    .with_token_count(token_count),
            )
            .await?;

        debug!(
            path = %path,
            snapshot_id = %ctx.snapshot_id,
            version = metadata.version,
            existed = metadata.exists,
            "Captured pre-image"
        );
        ctx.captured.insert(path.to_string());
        ctx.touched_files.push(path.to_string());
        Ok(())
    }

    async fn apply_effect(
        &self,
        operation: &Operation,
        effect: &FileEffect,
        ctx: &mut SnapshotContext,
    ) -> ExecutionResult<()> {
        self.capture_pre_image(&effect.path, ctx).await?;

        let description = format!(
            "{} {} ({})",
            operation.kind.name(),
            operation.operation_id,
            ctx.snapshot_id
        );

        let request = match &effect.content {
            Some(content) => {
                self.documents.write(&effect.path, content).await?;
                SnapshotRequest::content(&effect.path, content.clone(), ChangeType::Refactoring, description)
                    .with_token_count(self.tokens.count(content))
            }
            None => {
                self.documents.delete(&effect.path).await?;
                SnapshotRequest::tombstone(&effect.path, ChangeType::Refactoring, description)
            }
        };

        self.versions
            .create_snapshot(request.with_snapshot_id(ctx.snapshot_id.clone()))
            .await?;
        Ok(())
    }

    /// Apply one operation.
    ///
    /// Effects are applied in order; if one fails, the effects already
    /// applied stay in place and the error is returned.
    pub async fn execute(&self, operation: &Operation, ctx: &mut SnapshotContext) -> ExecutionResult<OperationResult> {
        let effects = {
            let mut state = WorkingSet::new(self.documents.as_ref());
            plan_operation(operation, &mut state).await?
        };

        for effect in &effects {
            self.apply_effect(operation, effect, ctx).await?;
        }

        let files: Vec<String> = effects.into_iter().map(|e| e.path).collect();
        info!(
            operation_id = %operation.operation_id,
            operation_type = operation.kind.name(),
            target_file = %operation.target_file,
            files = ?files,
            "Operation applied"
        );

        Ok(OperationResult {
            operation_id: operation.operation_id.clone(),
            operation_type: operation.kind.name().to_string(),
            target_file: operation.target_file.clone(),
            status: OperationStatus::Success,
            files,
            message: None,
        })
    }
}
