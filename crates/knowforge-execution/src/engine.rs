//! Execution engine
//!
//! Runs an approved suggestion's operations in order. Every attempt, whether
//! it succeeds, fails validation or fails part way, produces an
//! [`ExecutionRecord`] that is appended to the execution history.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use knowforge_files::{DocumentStore, TokenCounter};
use knowforge_versions::VersionStore;

use crate::approval::ApprovalManager;
use crate::error::ExecutionError;
use crate::history::ExecutionHistory;
use crate::ids::{dry_run_execution_id, execution_id, next_timestamp, snapshot_id};
use crate::models::{
    Approval, ExecutionRecord, ExecutionStatus, OperationResult, OperationStatus, Suggestion,
};
use crate::operation_executor::{OperationExecutor, SnapshotContext};
use crate::preview::build_preview;
use crate::validation::SuggestionValidator;

/// Parameters of one execution attempt
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    /// Suggestion to execute
    pub suggestion_id: String,
    /// Approval to run under; the earliest usable one when absent
    pub approval_id: Option<String>,
    /// Simulate only
    pub dry_run: bool,
    /// Validate every operation before executing any
    pub validate_first: bool,
}

impl ExecutionRequest {
    /// Real, validated execution of `suggestion_id`
    pub fn new(suggestion_id: impl Into<String>) -> Self {
        Self {
            suggestion_id: suggestion_id.into(),
            approval_id: None,
            dry_run: false,
            validate_first: true,
        }
    }

    /// Run under a specific approval
    pub fn with_approval(mut self, approval_id: impl Into<String>) -> Self {
        self.approval_id = Some(approval_id.into());
        self
    }

    /// Simulate only
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Toggle up-front validation
    pub fn validate_first(mut self, validate_first: bool) -> Self {
        self.validate_first = validate_first;
        self
    }
}

/// Executes suggestions and records every attempt
pub struct ExecutionEngine {
    documents: Arc<dyn DocumentStore>,
    executor: OperationExecutor,
    approvals: Arc<ApprovalManager>,
    history: Arc<ExecutionHistory>,
    // Serializes approval lookup, execution and mark_as_applied
    run_lock: Mutex<()>,
}

impl ExecutionEngine {
    /// Create an engine
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        versions: Arc<dyn VersionStore>,
        tokens: Arc<dyn TokenCounter>,
        approvals: Arc<ApprovalManager>,
        history: Arc<ExecutionHistory>,
    ) -> Self {
        Self {
            executor: OperationExecutor::new(documents.clone(), versions, tokens),
            documents,
            approvals,
            history,
            run_lock: Mutex::new(()),
        }
    }

    /// Execution history
    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    /// Execute `suggestion` under `request`. Never fails; every outcome is in
    /// the returned record.
    ///
    /// `suggestion` is `None` when the registry does not know the requested
    /// suggestion. Attempts without a suggestion id are returned but not
    /// persisted.
    pub async fn execute(&self, request: &ExecutionRequest, suggestion: Option<&Suggestion>) -> ExecutionRecord {
        let _guard = self.run_lock.lock().await;

        let started = next_timestamp();
        let suggestion_id = request.suggestion_id.trim();
        let mut record = ExecutionRecord {
            execution_id: if request.dry_run {
                dry_run_execution_id(suggestion_id, &started)
            } else {
                execution_id(suggestion_id, &started)
            },
            suggestion_id: suggestion_id.to_string(),
            approval_id: request.approval_id.clone(),
            status: ExecutionStatus::Success,
            dry_run: request.dry_run,
            operation_results: Vec::new(),
            snapshot_id: snapshot_id(&started),
            touched_files: Vec::new(),
            validation_errors: Vec::new(),
            message: None,
            missing_parameter: None,
            preview: None,
            created_at: started,
        };

        if suggestion_id.is_empty() {
            fail_validation(&mut record, ExecutionError::MissingParameter("suggestion_id".to_string()));
            return record;
        }

        self.run(request, suggestion, &mut record).await;

        if let Err(e) = self.history.append(record.clone()).await {
            error!(
                execution_id = %record.execution_id,
                error = %e,
                "Failed to persist execution record"
            );
        }
        record
    }

    async fn run(&self, request: &ExecutionRequest, suggestion: Option<&Suggestion>, record: &mut ExecutionRecord) {
        let Some(suggestion) = suggestion else {
            fail_validation(record, ExecutionError::SuggestionNotFound(record.suggestion_id.clone()));
            return;
        };

        let approval = match self
            .approvals
            .find_usable_approval(&suggestion.suggestion_id, request.approval_id.as_deref())
            .await
        {
            Ok(approval) => Some(approval),
            Err(e) if request.dry_run && request.approval_id.is_none() => {
                info!(suggestion_id = %suggestion.suggestion_id, reason = %e, "Dry run without approval");
                None
            }
            Err(e) => {
                fail_validation(record, e);
                return;
            }
        };
        record.approval_id = approval.as_ref().map(|a| a.approval_id.clone());

        if request.validate_first || request.dry_run || suggestion.operations.is_empty() {
            let issues = SuggestionValidator::validate(suggestion, self.documents.as_ref()).await;
            if !issues.is_empty() {
                warn!(
                    execution_id = %record.execution_id,
                    issues = issues.len(),
                    "Suggestion failed validation"
                );
                record.status = ExecutionStatus::ValidationFailed;
                record.message = Some(SuggestionValidator::summarize(&issues));
                record.missing_parameter = issues.iter().find_map(|i| i.missing_parameter.clone());
                record.validation_errors = issues;
                return;
            }
        }

        if request.dry_run {
            self.preview(suggestion, record).await;
        } else if let Some(approval) = approval {
            self.apply(suggestion, &approval, record).await;
        }
    }

    async fn preview(&self, suggestion: &Suggestion, record: &mut ExecutionRecord) {
        match build_preview(suggestion, self.documents.as_ref()).await {
            Ok(preview) => {
                record.message = Some(format!(
                    "Dry run: {} operation(s) would affect {} document(s)",
                    suggestion.operations.len(),
                    preview.files.len()
                ));
                info!(
                    execution_id = %record.execution_id,
                    files = preview.files.len(),
                    size_delta = preview.total_size_delta,
                    "Dry run completed"
                );
                record.preview = Some(preview);
            }
            Err(e) => {
                record.status = ExecutionStatus::Error;
                record.missing_parameter = e.missing_parameter().map(str::to_string);
                record.message = Some(format!("Dry run failed: {}", e));
            }
        }
    }

    async fn apply(&self, suggestion: &Suggestion, approval: &Approval, record: &mut ExecutionRecord) {
        info!(
            execution_id = %record.execution_id,
            suggestion_id = %suggestion.suggestion_id,
            approval_id = %approval.approval_id,
            operations = suggestion.operations.len(),
            "Executing suggestion"
        );

        let mut ctx = SnapshotContext::new(record.snapshot_id.clone());
        for operation in &suggestion.operations {
            match self.executor.execute(operation, &mut ctx).await {
                Ok(result) => record.operation_results.push(result),
                Err(e) => {
                    error!(
                        execution_id = %record.execution_id,
                        operation_id = %operation.operation_id,
                        error = %e,
                        "Operation failed"
                    );
                    record.operation_results.push(OperationResult {
                        operation_id: operation.operation_id.clone(),
                        operation_type: operation.kind.name().to_string(),
                        target_file: operation.target_file.clone(),
                        status: OperationStatus::Failed,
                        files: Vec::new(),
                        message: Some(e.to_string()),
                    });
                    record.status = ExecutionStatus::Error;
                    record.missing_parameter = e.missing_parameter().map(str::to_string);
                    record.message = Some(format!(
                        "Operation {} failed: {}",
                        operation.operation_id, e
                    ));
                    break;
                }
            }
        }
        record.touched_files = ctx.into_touched_files();

        if record.status == ExecutionStatus::Success {
            self.approvals
                .mark_as_applied(&approval.approval_id, &record.execution_id)
                .await;
            record.message = Some(format!(
                "Applied {} operation(s) to {} document(s)",
                record.operation_results.len(),
                record.touched_files.len()
            ));
        }

        info!(
            execution_id = %record.execution_id,
            status = %record.status,
            touched = record.touched_files.len(),
            "Execution finished"
        );
    }
}

fn fail_validation(record: &mut ExecutionRecord, e: ExecutionError) {
    warn!(execution_id = %record.execution_id, error = %e, "Execution rejected");
    record.status = ExecutionStatus::ValidationFailed;
    record.missing_parameter = e.missing_parameter().map(str::to_string);
    record.message = Some(e.to_string());
}
