//! Refactoring pipeline facade
//!
//! Ties approvals, execution, rollback and learning together behind the
//! operations an external caller drives. None of the entry points return
//! `Err`: failures surface as [`PipelineOutcome`] variants or as the status
//! of an execution or rollback record.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use knowforge_files::{DocumentPath, DocumentStore, FileSystemDocumentStore, TokenCounter, WhitespaceTokenCounter};
use knowforge_learning::{
    FeedbackLog, FeedbackRecord, FeedbackType, LearningEngine, LearningError, LearningInsights,
    NewFeedback,
};
use knowforge_versions::{FileVersionStore, VersionStore};

use crate::approval::ApprovalManager;
use crate::config::PipelineConfig;
use crate::engine::{ExecutionEngine, ExecutionRequest};
use crate::error::{ExecutionError, ExecutionResult};
use crate::history::{ExecutionHistory, RollbackHistory};
use crate::ids::suggestion_id_of_execution;
use crate::models::{Approval, ExecutionRecord, RollbackRecord, Suggestion};
use crate::registry::SuggestionRegistry;
use crate::rollback::{RollbackManager, RollbackRequest};

/// Outcome of a pipeline operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum PipelineOutcome<T> {
    /// The operation completed
    Success(T),
    /// The request was rejected before anything changed
    ValidationFailed {
        /// What is wrong with the request
        message: String,
        /// Name of a missing required parameter
        #[serde(default, skip_serializing_if = "Option::is_none")]
        missing_parameter: Option<String>,
    },
    /// The operation failed
    Error {
        /// Error description
        message: String,
    },
}

impl<T> PipelineOutcome<T> {
    /// Whether the operation completed
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    /// Result of a completed operation
    pub fn success(&self) -> Option<&T> {
        match self {
            PipelineOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Consume the outcome, keeping the result of a completed operation
    pub fn into_success(self) -> Option<T> {
        match self {
            PipelineOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Error or validation message
    pub fn message(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Success(_) => None,
            PipelineOutcome::ValidationFailed { message, .. } | PipelineOutcome::Error { message } => {
                Some(message)
            }
        }
    }
}

impl<T> From<ExecutionError> for PipelineOutcome<T> {
    fn from(error: ExecutionError) -> Self {
        match &error {
            ExecutionError::MissingParameter(name) => PipelineOutcome::ValidationFailed {
                missing_parameter: Some(name.clone()),
                message: error.to_string(),
            },
            ExecutionError::ValidationError(_)
            | ExecutionError::UnknownOperation(_)
            | ExecutionError::SuggestionNotFound(_)
            | ExecutionError::ApprovalNotFound(_)
            | ExecutionError::Learning(LearningError::InvalidFeedback(_)) => {
                PipelineOutcome::ValidationFailed {
                    message: error.to_string(),
                    missing_parameter: None,
                }
            }
            _ => PipelineOutcome::Error {
                message: error.to_string(),
            },
        }
    }
}

impl<T> From<ExecutionResult<T>> for PipelineOutcome<T> {
    fn from(result: ExecutionResult<T>) -> Self {
        match result {
            Ok(value) => PipelineOutcome::Success(value),
            Err(e) => e.into(),
        }
    }
}

/// Approval, execution, rollback and learning over one document store
pub struct RefactoringPipeline {
    documents: Arc<dyn DocumentStore>,
    versions: Arc<dyn VersionStore>,
    registry: Arc<dyn SuggestionRegistry>,
    config: PipelineConfig,
    approvals: Arc<ApprovalManager>,
    execution_history: Arc<ExecutionHistory>,
    rollback_history: Arc<RollbackHistory>,
    engine: ExecutionEngine,
    rollbacks: RollbackManager,
    learning: LearningEngine,
}

impl RefactoringPipeline {
    /// Pipeline over the given stores, keeping its audit state in memory
    pub async fn new(
        documents: Arc<dyn DocumentStore>,
        versions: Arc<dyn VersionStore>,
        registry: Arc<dyn SuggestionRegistry>,
        config: PipelineConfig,
    ) -> ExecutionResult<Self> {
        config.validate()?;
        let learning = LearningEngine::new(config.learning.clone(), FeedbackLog::in_memory())?;
        Ok(Self::assemble(
            documents,
            versions,
            registry,
            Arc::new(WhitespaceTokenCounter),
            config,
            Arc::new(ApprovalManager::in_memory()),
            Arc::new(ExecutionHistory::in_memory()),
            Arc::new(RollbackHistory::in_memory()),
            learning,
        ))
    }

    /// Pipeline over the documents under `root`, persisting its audit state
    /// in the configured storage directory
    pub async fn for_workspace(
        root: impl AsRef<Path>,
        config: PipelineConfig,
        registry: Arc<dyn SuggestionRegistry>,
    ) -> ExecutionResult<Self> {
        config.validate()?;
        let root = root.as_ref();
        let layout = config.layout_for(root);
        layout.ensure().await?;

        let mut documents =
            FileSystemDocumentStore::new(root).with_max_content_bytes(config.execution.max_content_bytes);
        if let Ok(inside) = layout.root().strip_prefix(root) {
            match DocumentPath::normalize(&inside.to_string_lossy()) {
                Ok(reserved) => documents = documents.with_reserved_dir(&reserved)?,
                Err(e) => warn!(
                    workspace = %root.display(),
                    storage = %layout.root().display(),
                    error = %e,
                    "Storage directory cannot be reserved in the workspace"
                ),
            }
        }
        let documents = Arc::new(documents);
        let versions = Arc::new(FileVersionStore::new(layout.versions_dir()));

        let (approvals, _) = ApprovalManager::open(layout.approvals_path()).await;
        let execution_history = ExecutionHistory::open(layout.execution_history_path()).await;
        let rollback_history = RollbackHistory::open(layout.rollback_history_path()).await;
        let (log, _) = FeedbackLog::open(layout.feedback_path()).await;
        let learning = LearningEngine::new(config.learning.clone(), log)?;

        info!(
            workspace = %root.display(),
            storage = %layout.root().display(),
            "Opened refactoring pipeline"
        );

        Ok(Self::assemble(
            documents,
            versions,
            registry,
            Arc::new(WhitespaceTokenCounter),
            config,
            Arc::new(approvals),
            Arc::new(execution_history),
            Arc::new(rollback_history),
            learning,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        documents: Arc<dyn DocumentStore>,
        versions: Arc<dyn VersionStore>,
        registry: Arc<dyn SuggestionRegistry>,
        tokens: Arc<dyn TokenCounter>,
        config: PipelineConfig,
        approvals: Arc<ApprovalManager>,
        execution_history: Arc<ExecutionHistory>,
        rollback_history: Arc<RollbackHistory>,
        learning: LearningEngine,
    ) -> Self {
        let engine = ExecutionEngine::new(
            documents.clone(),
            versions.clone(),
            tokens.clone(),
            approvals.clone(),
            execution_history.clone(),
        );
        let rollbacks = RollbackManager::new(
            documents.clone(),
            versions.clone(),
            tokens,
            rollback_history.clone(),
        );
        Self {
            documents,
            versions,
            registry,
            config,
            approvals,
            execution_history,
            rollback_history,
            engine,
            rollbacks,
            learning,
        }
    }

    /// Replace the token counter used for snapshot metadata
    pub fn with_token_counter(self, tokens: Arc<dyn TokenCounter>) -> Self {
        Self::assemble(
            self.documents,
            self.versions,
            self.registry,
            tokens,
            self.config,
            self.approvals,
            self.execution_history,
            self.rollback_history,
            self.learning,
        )
    }

    /// Active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Learning engine, for filtering newly generated suggestions
    pub fn learning(&self) -> &LearningEngine {
        &self.learning
    }

    async fn require_suggestion(&self, suggestion_id: &str) -> ExecutionResult<Suggestion> {
        if suggestion_id.trim().is_empty() {
            return Err(ExecutionError::MissingParameter("suggestion_id".to_string()));
        }
        self.registry
            .get_suggestion(suggestion_id)
            .await
            .ok_or_else(|| ExecutionError::SuggestionNotFound(suggestion_id.to_string()))
    }

    async fn feedback(
        &self,
        suggestion: &Suggestion,
        feedback_type: FeedbackType,
        comment: Option<String>,
    ) -> ExecutionResult<FeedbackRecord> {
        let details = serde_json::to_value(suggestion).unwrap_or(serde_json::Value::Null);
        let feedback = NewFeedback::new(
            &suggestion.suggestion_id,
            suggestion.refactoring_type.as_str(),
            feedback_type,
            suggestion.confidence,
        )
        .with_comment(comment)
        .with_details(details);
        Ok(self.learning.record_feedback(feedback).await?)
    }

    /// Automatic feedback; failures are logged and do not affect the caller
    async fn auto_feedback(&self, suggestion: &Suggestion, feedback_type: FeedbackType, comment: Option<String>) {
        if let Err(e) = self.feedback(suggestion, feedback_type, comment).await {
            warn!(
                suggestion_id = %suggestion.suggestion_id,
                feedback_type = %feedback_type,
                error = %e,
                "Failed to record feedback"
            );
        }
    }

    /// Approve a suggestion. With `auto_apply` the suggestion is applied
    /// immediately and the approval is returned as it stands afterwards.
    pub async fn approve(
        &self,
        suggestion_id: &str,
        comment: Option<String>,
        auto_apply: bool,
    ) -> PipelineOutcome<Approval> {
        let suggestion = match self.require_suggestion(suggestion_id).await {
            Ok(suggestion) => suggestion,
            Err(e) => return e.into(),
        };

        let approval = match self.approvals.approve(suggestion_id, comment.clone(), auto_apply).await {
            Ok(approval) => approval,
            Err(e) => return e.into(),
        };
        self.auto_feedback(&suggestion, FeedbackType::Approved, comment).await;

        if !auto_apply {
            return PipelineOutcome::Success(approval);
        }

        let record = self
            .apply(
                suggestion_id,
                Some(&approval.approval_id),
                false,
                self.config.execution.validate_first_default,
            )
            .await;
        if !record.is_success() {
            warn!(
                approval_id = %approval.approval_id,
                execution_id = %record.execution_id,
                status = %record.status,
                "Auto-apply did not succeed"
            );
        }

        match self.approvals.get_approval(&approval.approval_id).await {
            Some(updated) => PipelineOutcome::Success(updated),
            None => PipelineOutcome::Success(approval),
        }
    }

    /// Reject a suggestion
    pub async fn reject(&self, suggestion_id: &str, comment: Option<String>) -> PipelineOutcome<Approval> {
        let suggestion = match self.require_suggestion(suggestion_id).await {
            Ok(suggestion) => suggestion,
            Err(e) => return e.into(),
        };

        match self.approvals.reject(suggestion_id, comment.clone()).await {
            Ok(approval) => {
                self.auto_feedback(&suggestion, FeedbackType::Rejected, comment).await;
                PipelineOutcome::Success(approval)
            }
            Err(e) => e.into(),
        }
    }

    /// Execute an approved suggestion
    pub async fn apply(
        &self,
        suggestion_id: &str,
        approval_id: Option<&str>,
        dry_run: bool,
        validate_first: bool,
    ) -> ExecutionRecord {
        let suggestion = self.registry.get_suggestion(suggestion_id).await;
        let request = ExecutionRequest {
            suggestion_id: suggestion_id.to_string(),
            approval_id: approval_id.map(str::to_string),
            dry_run,
            validate_first,
        };

        let record = self.engine.execute(&request, suggestion.as_ref()).await;

        if let Some(suggestion) = &suggestion {
            if record.is_success() && !record.dry_run {
                self.auto_feedback(suggestion, FeedbackType::Applied, None).await;
            }
        }
        record
    }

    /// Execute with the configured validation default
    pub async fn apply_with_defaults(&self, suggestion_id: &str, approval_id: Option<&str>) -> ExecutionRecord {
        self.apply(
            suggestion_id,
            approval_id,
            false,
            self.config.execution.validate_first_default,
        )
        .await
    }

    /// Roll back an execution
    pub async fn rollback(
        &self,
        execution_id: &str,
        restore_snapshot: bool,
        preserve_manual_changes: bool,
        dry_run: bool,
    ) -> RollbackRecord {
        let record = self
            .rollbacks
            .rollback(RollbackRequest {
                execution_id: execution_id.to_string(),
                restore_snapshot,
                preserve_manual_changes,
                dry_run,
            })
            .await;

        if !record.dry_run && !record.restored_files.is_empty() {
            let suggestion = match suggestion_id_of_execution(execution_id) {
                Some(suggestion_id) => self.registry.get_suggestion(suggestion_id).await,
                None => None,
            };
            match suggestion {
                Some(suggestion) => {
                    let comment = Some(format!("Rolled back by {}", record.rollback_id));
                    self.auto_feedback(&suggestion, FeedbackType::Reverted, comment).await;
                }
                None => warn!(
                    execution_id = %execution_id,
                    "Suggestion of rolled back execution is unknown; no feedback recorded"
                ),
            }
        }
        record
    }

    /// Roll back with the configured defaults
    pub async fn rollback_with_defaults(&self, execution_id: &str) -> RollbackRecord {
        self.rollback(
            execution_id,
            self.config.rollback.restore_snapshot_default,
            self.config.rollback.preserve_manual_changes_default,
            false,
        )
        .await
    }

    /// Record explicit feedback about a suggestion
    pub async fn record_feedback(
        &self,
        suggestion_id: &str,
        feedback_type: FeedbackType,
        comment: Option<String>,
    ) -> PipelineOutcome<FeedbackRecord> {
        match self.require_suggestion(suggestion_id).await {
            Ok(suggestion) => self.feedback(&suggestion, feedback_type, comment).await.into(),
            Err(e) => e.into(),
        }
    }

    /// Aggregated feedback statistics
    pub async fn learning_insights(&self) -> LearningInsights {
        self.learning.get_learning_insights().await
    }

    /// Every execution attempt, oldest first
    pub async fn execution_history(&self) -> Vec<ExecutionRecord> {
        self.execution_history.all().await
    }

    /// Every persisted rollback, oldest first
    pub async fn rollback_history(&self) -> Vec<RollbackRecord> {
        self.rollback_history.all().await
    }

    /// Every approval of a suggestion, in creation order
    pub async fn approvals_for(&self, suggestion_id: &str) -> Vec<Approval> {
        self.approvals.get_approvals_for(suggestion_id).await
    }
}
