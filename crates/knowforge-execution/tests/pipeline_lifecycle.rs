//! End-to-end tests of approve, apply, rollback and learning over a real
//! workspace directory

use std::sync::Arc;

use knowforge_execution::{
    ApprovalStatus, ExecutionStatus, InMemorySuggestionRegistry, Operation, OperationKind,
    PipelineConfig, PipelineOutcome, Priority, RefactoringPipeline, RefactoringType,
    RollbackStatus, Suggestion,
};
use knowforge_files::{DocumentStore, FileSystemDocumentStore};
use knowforge_learning::FeedbackType;
use knowforge_versions::{ChangeType, FileVersionStore, SnapshotRequest, VersionStore};
use tempfile::TempDir;

const SUGGESTIONS: &str = r#"[
  {
    "suggestion_id": "S1",
    "refactoring_type": "consolidate",
    "confidence": 0.9,
    "priority": "high",
    "description": "Merge the intro and usage sections",
    "operations": [
      {
        "operation_id": "op1",
        "type": "consolidate",
        "target_file": "merged.md",
        "sources": [
          {"file": "a.md", "sections": ["Intro"]},
          {"file": "b.md", "sections": ["Usage"]}
        ]
      }
    ]
  }
]"#;

const A_MD: &str = "# Alpha\n\n## Intro\nalpha intro\n\n## Other\nignored\n";
const B_MD: &str = "# Beta\n\n## Usage\nbeta usage\n";

struct Workspace {
    dir: TempDir,
    registry: Arc<InMemorySuggestionRegistry>,
    documents: FileSystemDocumentStore,
    pipeline: RefactoringPipeline,
}

impl Workspace {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let documents = FileSystemDocumentStore::new(dir.path());
        documents.write("a.md", A_MD).await.unwrap();
        documents.write("b.md", B_MD).await.unwrap();

        let registry = Arc::new(InMemorySuggestionRegistry::new());
        registry.register_json(SUGGESTIONS).await.unwrap();

        let pipeline = RefactoringPipeline::for_workspace(dir.path(), PipelineConfig::default(), registry.clone())
            .await
            .unwrap();

        Self {
            dir,
            registry,
            documents,
            pipeline,
        }
    }

    async fn reopen(&self) -> RefactoringPipeline {
        RefactoringPipeline::for_workspace(self.dir.path(), PipelineConfig::default(), self.registry.clone())
            .await
            .unwrap()
    }

    fn versions(&self) -> FileVersionStore {
        FileVersionStore::new(self.dir.path().join(".knowforge").join("versions"))
    }

    async fn register_modify(&self, suggestion_id: &str, path: &str, content: &str) {
        self.registry
            .register(Suggestion {
                suggestion_id: suggestion_id.to_string(),
                refactoring_type: RefactoringType::Reorganize,
                confidence: 0.6,
                priority: Priority::Low,
                description: String::new(),
                operations: vec![Operation::new(
                    "op1",
                    path,
                    OperationKind::Modify {
                        content: Some(content.to_string()),
                    },
                )],
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_consolidate_apply_and_rollback() {
    let ws = Workspace::new().await;

    let approval = ws.pipeline.approve("S1", None, false).await.into_success().unwrap();
    assert_eq!(approval.status, ApprovalStatus::Approved);

    let record = ws.pipeline.apply("S1", None, false, true).await;
    assert_eq!(record.status, ExecutionStatus::Success, "{:?}", record.message);
    assert_eq!(record.touched_files, vec!["merged.md".to_string()]);

    let merged = ws.documents.read("merged.md").await.unwrap().content;
    assert_eq!(merged, "## Intro\nalpha intro\n\n## Usage\nbeta usage\n");
    assert_eq!(ws.documents.read("a.md").await.unwrap().content, A_MD);
    assert_eq!(ws.documents.read("b.md").await.unwrap().content, B_MD);

    let rollback = ws.pipeline.rollback(&record.execution_id, true, true, false).await;
    assert_eq!(rollback.status, RollbackStatus::Success, "{:?}", rollback.message);
    assert_eq!(rollback.restored_files, vec!["merged.md".to_string()]);
    assert!(!ws.documents.exists("merged.md").await.unwrap());
    assert_eq!(ws.documents.read("a.md").await.unwrap().content, A_MD);
    assert_eq!(ws.documents.read("b.md").await.unwrap().content, B_MD);

    let history = ws.versions().get_history("merged.md").await.unwrap();
    assert_eq!(history.last().unwrap().change_type, ChangeType::Rollback);
    assert!(!history.last().unwrap().exists);

    let insights = ws.pipeline.learning_insights().await;
    assert_eq!(insights.total_feedback, 3);
    let consolidate = &insights.by_type["consolidate"];
    assert_eq!(consolidate.approved, 1);
    assert_eq!(consolidate.applied, 1);
    assert_eq!(consolidate.reverted, 1);
}

#[tokio::test]
async fn test_unrelated_approval_leaves_lookup_unchanged() {
    let ws = Workspace::new().await;
    ws.register_modify("S2", "a.md", "other").await;

    ws.pipeline.approve("S1", Some("first".into()), false).await;
    let before = ws.pipeline.approvals_for("S1").await;

    ws.pipeline.approve("S2", None, false).await;
    ws.pipeline.reject("S2", None).await;

    assert_eq!(ws.pipeline.approvals_for("S1").await, before);
}

#[tokio::test]
async fn test_approval_is_applied_at_most_once() {
    let ws = Workspace::new().await;
    let approval = ws.pipeline.approve("S1", None, false).await.into_success().unwrap();

    let first = ws.pipeline.apply("S1", Some(&approval.approval_id), false, true).await;
    assert!(first.is_success());

    let second = ws.pipeline.apply("S1", Some(&approval.approval_id), false, true).await;
    assert_eq!(second.status, ExecutionStatus::ValidationFailed);
    assert!(second.message.as_deref().unwrap().contains("already applied"));

    let third = ws.pipeline.apply("S1", None, false, true).await;
    assert_eq!(third.status, ExecutionStatus::ValidationFailed);

    let history = ws.pipeline.execution_history().await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].execution_id, first.execution_id);
    assert_ne!(history[1].execution_id, history[0].execution_id);
    assert_ne!(history[2].execution_id, history[1].execution_id);

    let stored = ws.pipeline.approvals_for("S1").await;
    assert_eq!(stored[0].status, ApprovalStatus::Applied);
    assert_eq!(stored[0].execution_id.as_deref(), Some(first.execution_id.as_str()));
}

#[tokio::test]
async fn test_pre_image_recorded_before_mutation() {
    let ws = Workspace::new().await;
    ws.register_modify("S2", "a.md", "rewritten\n").await;
    ws.pipeline.approve("S2", None, false).await;

    let record = ws.pipeline.apply("S2", None, false, true).await;
    assert!(record.is_success());

    let versions = ws.versions();
    let history = versions.get_history("a.md").await.unwrap();
    let pre_image = history
        .iter()
        .find(|m| m.is_pre_image_of(&record.snapshot_id))
        .expect("pre-image recorded");
    let stored = versions.get_version("a.md", pre_image.version).await.unwrap().unwrap();
    assert_eq!(stored.content.as_deref(), Some(A_MD));
    assert_eq!(ws.documents.read("a.md").await.unwrap().content, "rewritten\n");
}

#[tokio::test]
async fn test_rollback_restores_pre_image_exactly() {
    let ws = Workspace::new().await;
    ws.register_modify("S2", "a.md", "rewritten\n").await;
    ws.pipeline.approve("S2", None, true).await;

    let executions = ws.pipeline.execution_history().await;
    assert_eq!(executions.len(), 1);
    assert!(executions[0].is_success());

    let rollback = ws.pipeline.rollback_with_defaults(&executions[0].execution_id).await;
    assert_eq!(rollback.status, RollbackStatus::Success);
    assert_eq!(ws.documents.read("a.md").await.unwrap().content, A_MD);
}

#[tokio::test]
async fn test_external_edit_is_preserved_and_backed_up() {
    let ws = Workspace::new().await;
    ws.register_modify("S2", "a.md", "rewritten\n").await;
    ws.pipeline.approve("S2", None, false).await;
    let record = ws.pipeline.apply("S2", None, false, true).await;

    ws.documents.write("a.md", "edited by hand\n").await.unwrap();

    let rollback = ws.pipeline.rollback(&record.execution_id, true, true, false).await;
    assert_eq!(rollback.status, RollbackStatus::Failed);
    assert!(rollback.restored_files.is_empty());
    assert_eq!(rollback.conflicts.len(), 1);
    assert_eq!(rollback.conflicts[0].file, "a.md");
    assert_eq!(rollback.conflicts[0].reason, "modified after refactoring");

    assert_eq!(ws.documents.read("a.md").await.unwrap().content, "edited by hand\n");

    let versions = ws.versions();
    let backup_version = rollback.conflicts[0].backup_version.unwrap();
    let backup = versions.get_version("a.md", backup_version).await.unwrap().unwrap();
    assert_eq!(backup.metadata.change_type, ChangeType::ManualBackup);
    assert_eq!(backup.content.as_deref(), Some("edited by hand\n"));

    // No document restored, so nothing was reverted
    let insights = ws.pipeline.learning_insights().await;
    assert_eq!(insights.by_type["reorganize"].reverted, 0);
}

#[tokio::test]
async fn test_overwrite_rollback_ignores_external_edit() {
    let ws = Workspace::new().await;
    ws.register_modify("S2", "a.md", "rewritten\n").await;
    ws.pipeline.approve("S2", None, false).await;
    let record = ws.pipeline.apply("S2", None, false, true).await;

    ws.documents.write("a.md", "edited by hand\n").await.unwrap();

    let rollback = ws.pipeline.rollback(&record.execution_id, true, false, false).await;
    assert_eq!(rollback.status, RollbackStatus::Success);
    assert_eq!(ws.documents.read("a.md").await.unwrap().content, A_MD);
}

#[tokio::test]
async fn test_dry_runs_change_nothing() {
    let ws = Workspace::new().await;

    let preview = ws.pipeline.apply("S1", None, true, true).await;
    assert!(preview.is_success());
    assert!(preview.dry_run);
    assert!(!ws.documents.exists("merged.md").await.unwrap());
    assert!(ws.versions().tracked_paths().await.unwrap().is_empty());

    let unresolvable = ws.pipeline.rollback(&preview.execution_id, true, true, false).await;
    assert_eq!(unresolvable.status, RollbackStatus::ValidationFailed);

    ws.pipeline.approve("S1", None, false).await;
    let record = ws.pipeline.apply("S1", None, false, true).await;
    let before = ws.pipeline.rollback_history().await.len();

    let analysis = ws.pipeline.rollback(&record.execution_id, true, true, true).await;
    assert_eq!(analysis.status, RollbackStatus::Success);
    assert!(analysis.restored_files.is_empty());
    assert!(ws.documents.exists("merged.md").await.unwrap());
    assert_eq!(ws.pipeline.rollback_history().await.len(), before);
}

#[tokio::test]
async fn test_invalid_requests_report_missing_parameters() {
    let ws = Workspace::new().await;

    match ws.pipeline.approve("", None, false).await {
        PipelineOutcome::ValidationFailed { missing_parameter, .. } => {
            assert_eq!(missing_parameter.as_deref(), Some("suggestion_id"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let rollback = ws.pipeline.rollback("", true, true, false).await;
    assert_eq!(rollback.status, RollbackStatus::ValidationFailed);
    assert_eq!(rollback.missing_parameter.as_deref(), Some("execution_id"));
    assert!(ws.pipeline.rollback_history().await.is_empty());

    let unknown = ws.pipeline.record_feedback("nope", FeedbackType::Approved, None).await;
    assert!(matches!(unknown, PipelineOutcome::ValidationFailed { .. }));
}

#[tokio::test]
async fn test_audit_state_survives_reopen_and_corruption() {
    let ws = Workspace::new().await;
    ws.pipeline.approve("S1", None, false).await;
    let record = ws.pipeline.apply("S1", None, false, true).await;
    let rollback = ws.pipeline.rollback(&record.execution_id, true, true, false).await;

    let path = ws.dir.path().join(".knowforge").join("rollback-history.json");
    let mut document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    document["rollbacks"]["broken"] = serde_json::json!({"rollback_id": "broken", "status": []});
    std::fs::write(&path, document.to_string()).unwrap();

    let reopened = ws.reopen().await;
    let rollbacks = reopened.rollback_history().await;
    assert_eq!(rollbacks.len(), 1);
    assert_eq!(rollbacks[0].rollback_id, rollback.rollback_id);

    assert_eq!(reopened.execution_history().await.len(), 1);
    assert_eq!(reopened.approvals_for("S1").await[0].status, ApprovalStatus::Applied);
    assert_eq!(reopened.learning_insights().await.total_feedback, 3);
}

#[tokio::test]
async fn test_analysis_only_rollback_is_recorded_without_writes() {
    let ws = Workspace::new().await;
    ws.register_modify("S2", "a.md", "rewritten\n").await;
    ws.pipeline.approve("S2", None, false).await;
    let record = ws.pipeline.apply("S2", None, false, true).await;

    let rollback = ws.pipeline.rollback(&record.execution_id, false, true, false).await;
    assert_eq!(rollback.status, RollbackStatus::Success);
    assert_eq!(rollback.affected_files, vec!["a.md".to_string()]);
    assert!(rollback.restored_files.is_empty());
    assert_eq!(ws.documents.read("a.md").await.unwrap().content, "rewritten\n");

    let changes: Vec<ChangeType> = ws
        .versions()
        .get_history("a.md")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.change_type)
        .collect();
    assert_eq!(changes, vec![ChangeType::PreRefactoring, ChangeType::Refactoring]);

    let stored = ws.pipeline.rollback_history().await;
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].restore_snapshot);
    assert_eq!(ws.pipeline.learning_insights().await.by_type["reorganize"].reverted, 0);
}

#[tokio::test]
async fn test_storage_directory_is_out_of_reach() {
    let ws = Workspace::new().await;
    ws.registry
        .register(Suggestion {
            suggestion_id: "S3".to_string(),
            refactoring_type: RefactoringType::Delete,
            confidence: 0.5,
            priority: Priority::Low,
            description: String::new(),
            operations: vec![
                Operation::new(
                    "op1",
                    ".knowforge/approvals.json",
                    OperationKind::Modify {
                        content: Some("{}".to_string()),
                    },
                ),
                Operation::new("op2", "./.knowforge/versions", OperationKind::Delete),
            ],
        })
        .await
        .unwrap();
    ws.pipeline.approve("S3", None, false).await;

    let approvals = ws.dir.path().join(".knowforge").join("approvals.json");
    let before = std::fs::read_to_string(&approvals).unwrap();

    let validated = ws.pipeline.apply("S3", None, false, true).await;
    assert_eq!(validated.status, ExecutionStatus::ValidationFailed);
    assert_eq!(validated.validation_errors.len(), 2);

    let unvalidated = ws.pipeline.apply("S3", None, false, false).await;
    assert_eq!(unvalidated.status, ExecutionStatus::Error);
    assert!(unvalidated.touched_files.is_empty());

    assert_eq!(std::fs::read_to_string(&approvals).unwrap(), before);
    assert_eq!(ws.pipeline.approvals_for("S3").await[0].status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn test_unreadable_version_history_blocks_execution() {
    let ws = Workspace::new().await;
    ws.register_modify("S2", "a.md", "rewritten\n").await;
    ws.pipeline.approve("S2", None, false).await;

    ws.versions()
        .create_snapshot(SnapshotRequest::content("a.md", A_MD, ChangeType::Initial, "imported"))
        .await
        .unwrap();
    let history_file = ws.dir.path().join(".knowforge").join("versions").join("a.md.json");
    std::fs::write(&history_file, "{\"versions\": [").unwrap();

    let record = ws.pipeline.apply("S2", None, false, true).await;
    assert_eq!(record.status, ExecutionStatus::Error);
    assert_eq!(ws.documents.read("a.md").await.unwrap().content, A_MD);
    assert_eq!(std::fs::read_to_string(&history_file).unwrap(), "{\"versions\": [");
}
