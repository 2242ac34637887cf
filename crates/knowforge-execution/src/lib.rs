//! Knowforge Execution - Approval, execution and rollback of refactorings
//!
//! A suggestion generated elsewhere moves through this crate as follows:
//! - [`ApprovalManager`] records approve/reject decisions
//! - [`ExecutionEngine`] validates and applies the suggestion's operations,
//!   snapshotting each document before its first change
//! - [`RollbackManager`] restores those snapshots, protecting documents that
//!   were edited after the execution
//! - [`RefactoringPipeline`] wires the above to the learning engine
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use knowforge_execution::{
//!     InMemorySuggestionRegistry, Operation, OperationKind, PipelineConfig, Priority,
//!     RefactoringPipeline, RefactoringType, Suggestion,
//! };
//!
//! # tokio_test::block_on(async {
//! let workspace = tempfile::tempdir().unwrap();
//! let registry = Arc::new(InMemorySuggestionRegistry::new());
//! registry
//!     .register(Suggestion {
//!         suggestion_id: "s1".to_string(),
//!         refactoring_type: RefactoringType::Create,
//!         confidence: 0.8,
//!         priority: Priority::Medium,
//!         description: "Add an index".to_string(),
//!         operations: vec![Operation::new(
//!             "op1",
//!             "index.md",
//!             OperationKind::Create { content: Some("# Index\n".to_string()) },
//!         )],
//!     })
//!     .await
//!     .unwrap();
//!
//! let pipeline = RefactoringPipeline::for_workspace(workspace.path(), PipelineConfig::default(), registry)
//!     .await
//!     .unwrap();
//!
//! pipeline.approve("s1", None, false).await;
//! let execution = pipeline.apply_with_defaults("s1", None).await;
//! assert!(execution.is_success());
//!
//! let rollback = pipeline.rollback_with_defaults(&execution.execution_id).await;
//! assert_eq!(rollback.restored_files, vec!["index.md".to_string()]);
//! # });
//! ```

pub mod approval;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod ids;
pub mod models;
pub mod operation_executor;
pub mod pipeline;
pub mod planner;
pub mod preview;
pub mod registry;
pub mod rollback;
pub mod validation;

pub use approval::ApprovalManager;
pub use config::{ExecutionConfig, PipelineConfig, RollbackConfig};
pub use engine::{ExecutionEngine, ExecutionRequest};
pub use error::{ExecutionError, ExecutionResult};
pub use history::{ExecutionHistory, RollbackHistory};
pub use models::{
    Approval, ApprovalStatus, ConsolidateSource, ExecutionRecord, ExecutionStatus, Operation,
    OperationKind, OperationResult, OperationStatus, Priority, RefactoringType, RollbackConflict,
    RollbackFailure, RollbackRecord, RollbackStatus, SplitOutput, Suggestion, ValidationIssue,
};
pub use operation_executor::{OperationExecutor, SnapshotContext};
pub use pipeline::{PipelineOutcome, RefactoringPipeline};
pub use preview::{ExecutionPreview, FileChange, FilePreview};
pub use registry::{InMemorySuggestionRegistry, SuggestionRegistry};
pub use rollback::{AffectedFile, RollbackManager, RollbackRequest};
pub use validation::SuggestionValidator;
