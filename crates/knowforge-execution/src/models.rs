//! Data models for suggestions, approvals, executions and rollbacks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::preview::ExecutionPreview;

/// Kind of structural change a suggestion proposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefactoringType {
    /// Merge content of several documents
    Consolidate,
    /// Break one document into several
    Split,
    /// Restructure documents
    Reorganize,
    /// Rename a document
    Rename,
    /// Move a document
    Move,
    /// Remove a document
    Delete,
    /// Add a document
    Create,
}

impl RefactoringType {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            RefactoringType::Consolidate => "consolidate",
            RefactoringType::Split => "split",
            RefactoringType::Reorganize => "reorganize",
            RefactoringType::Rename => "rename",
            RefactoringType::Move => "move",
            RefactoringType::Delete => "delete",
            RefactoringType::Create => "create",
        }
    }
}

impl fmt::Display for RefactoringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suggestion priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low priority
    Low,
    /// Medium priority
    #[default]
    Medium,
    /// High priority
    High,
    /// Critical priority
    Critical,
}

/// One source of a consolidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidateSource {
    /// Source document
    #[serde(default)]
    pub file: String,
    /// Section headings to take; empty takes the whole document
    #[serde(default)]
    pub sections: Vec<String>,
}

/// One output of a split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOutput {
    /// Document to create
    #[serde(default)]
    pub destination: String,
    /// Section headings to copy; empty copies the whole source
    #[serde(default)]
    pub sections: Vec<String>,
    /// Optional title written as a top-level heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

/// Typed parameters of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    /// Create the target with `content`
    Create {
        /// New content
        #[serde(default)]
        content: Option<String>,
    },
    /// Overwrite the target with `content`
    Modify {
        /// New content
        #[serde(default)]
        content: Option<String>,
    },
    /// Remove the target
    Delete,
    /// Move the target to `destination`
    Move {
        /// Destination path
        #[serde(default)]
        destination: String,
    },
    /// Rename the target within its directory
    Rename {
        /// New file name
        #[serde(default)]
        new_name: String,
    },
    /// Concatenate sections of `sources` into the target
    Consolidate {
        /// Source documents and their sections
        #[serde(default)]
        sources: Vec<ConsolidateSource>,
        /// Text placed between merged parts
        #[serde(default, skip_serializing_if = "Option::is_none")]
        separator: Option<String>,
    },
    /// Copy sections of the target into new documents
    Split {
        /// Documents to create
        #[serde(default)]
        outputs: Vec<SplitOutput>,
    },
    /// Any operation type this version does not understand
    #[serde(other)]
    Unknown,
}

impl OperationKind {
    /// Name of the operation type
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Create { .. } => "create",
            OperationKind::Modify { .. } => "modify",
            OperationKind::Delete => "delete",
            OperationKind::Move { .. } => "move",
            OperationKind::Rename { .. } => "rename",
            OperationKind::Consolidate { .. } => "consolidate",
            OperationKind::Split { .. } => "split",
            OperationKind::Unknown => "unknown",
        }
    }
}

/// One atomic change against a target document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation id, unique within its suggestion
    pub operation_id: String,
    /// Document the operation targets
    #[serde(default)]
    pub target_file: String,
    /// Operation type and parameters
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl Operation {
    /// Create an operation
    pub fn new(operation_id: impl Into<String>, target_file: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            operation_id: operation_id.into(),
            target_file: target_file.into(),
            kind,
        }
    }
}

/// A generated refactoring proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Suggestion id
    pub suggestion_id: String,
    /// Kind of refactoring
    pub refactoring_type: RefactoringType,
    /// Generator confidence between 0.0 and 1.0
    pub confidence: f64,
    /// Priority
    #[serde(default)]
    pub priority: Priority,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Operations, applied in order
    #[serde(default)]
    pub operations: Vec<Operation>,
}

/// Approval lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a decision
    Pending,
    /// Accepted and usable for execution
    Approved,
    /// Declined
    Rejected,
    /// Consumed by a successful execution
    Applied,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
            ApprovalStatus::Applied => write!(f, "applied"),
        }
    }
}

/// A recorded decision about a suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    /// Approval id
    pub approval_id: String,
    /// Suggestion the decision is about
    pub suggestion_id: String,
    /// Lifecycle state
    pub status: ApprovalStatus,
    /// Free-text comment
    #[serde(default)]
    pub comment: Option<String>,
    /// Whether the suggestion should be applied immediately
    #[serde(default)]
    pub auto_apply: bool,
    /// Execution that consumed this approval
    #[serde(default)]
    pub execution_id: Option<String>,
    /// When the decision was recorded
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

/// Overall outcome of an execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Every operation completed
    Success,
    /// Nothing was executed because validation failed
    ValidationFailed,
    /// An operation failed part way through
    Error,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::ValidationFailed => write!(f, "validation_failed"),
            ExecutionStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of a single operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Operation completed
    Success,
    /// Operation failed
    Failed,
}

/// Result of executing one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Operation id
    pub operation_id: String,
    /// Operation type name
    pub operation_type: String,
    /// Operation target
    pub target_file: String,
    /// Outcome
    pub status: OperationStatus,
    /// Documents written or removed
    #[serde(default)]
    pub files: Vec<String>,
    /// Error message on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Validation problem found before execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Offending operation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// What is wrong
    pub message: String,
    /// Name of a missing required parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_parameter: Option<String>,
}

/// Append-only record of one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// `exec-{suggestion_id}-{timestamp}`, or a synthetic id for dry runs
    pub execution_id: String,
    /// Executed suggestion
    pub suggestion_id: String,
    /// Approval the execution ran under
    #[serde(default)]
    pub approval_id: Option<String>,
    /// Outcome
    pub status: ExecutionStatus,
    /// Whether nothing was written
    #[serde(default)]
    pub dry_run: bool,
    /// Per-operation results in execution order
    #[serde(default)]
    pub operation_results: Vec<OperationResult>,
    /// `refactoring-{timestamp}`
    pub snapshot_id: String,
    /// Documents that received a pre-image snapshot
    #[serde(default)]
    pub touched_files: Vec<String>,
    /// Validation problems when status is `validation_failed`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<ValidationIssue>,
    /// Summary or error message
    #[serde(default)]
    pub message: Option<String>,
    /// Name of a missing required parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_parameter: Option<String>,
    /// Simulated effects of a dry run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<ExecutionPreview>,
    /// When the attempt started
    pub created_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Whether every operation completed
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Overall outcome of a rollback attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    /// Every affected document was handled without conflicts or failures
    Success,
    /// Some documents were restored, others were skipped or failed
    Partial,
    /// No document could be restored
    Failed,
    /// The request itself was invalid
    ValidationFailed,
}

impl fmt::Display for RollbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackStatus::Success => write!(f, "success"),
            RollbackStatus::Partial => write!(f, "partial"),
            RollbackStatus::Failed => write!(f, "failed"),
            RollbackStatus::ValidationFailed => write!(f, "validation_failed"),
        }
    }
}

/// A document skipped because it changed after the execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackConflict {
    /// Document path
    pub file: String,
    /// Why the document is in conflict
    pub reason: String,
    /// Version holding a backup of the current content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_version: Option<u64>,
}

/// A document whose restore failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackFailure {
    /// Document path
    pub file: String,
    /// Error message
    pub error: String,
}

/// Record of one rollback attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackRecord {
    /// `rollback-{execution_id}-{timestamp}`
    pub rollback_id: String,
    /// Execution being rolled back
    pub execution_id: String,
    /// Snapshot derived from the execution id
    #[serde(default)]
    pub snapshot_id: Option<String>,
    /// When the rollback ran
    pub created_at: DateTime<Utc>,
    /// Whether externally edited documents were protected
    pub preserve_manual_edits: bool,
    /// Whether documents were to be restored
    #[serde(default = "default_true")]
    pub restore_snapshot: bool,
    /// Whether this was analysis only
    #[serde(default)]
    pub dry_run: bool,
    /// Outcome
    pub status: RollbackStatus,
    /// Documents with a pre-image in the snapshot
    #[serde(default)]
    pub affected_files: Vec<String>,
    /// Documents put back to their pre-image
    #[serde(default)]
    pub restored_files: Vec<String>,
    /// Documents skipped because of external edits
    #[serde(default)]
    pub conflicts: Vec<RollbackConflict>,
    /// Documents whose restore failed
    #[serde(default)]
    pub failed_files: Vec<RollbackFailure>,
    /// Summary message
    #[serde(default)]
    pub message: Option<String>,
    /// Name of a missing required parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_parameter: Option<String>,
}

fn default_true() -> bool {
    true
}
