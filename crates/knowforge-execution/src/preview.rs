//! Dry-run previews of a suggestion's effects

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use knowforge_files::DocumentStore;

use crate::error::ExecutionResult;
use crate::models::Suggestion;
use crate::planner::{plan_operation, WorkingSet};

/// How a document would change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChange {
    /// Document would be created
    Create,
    /// Document content would change
    Modify,
    /// Document would be removed
    Delete,
    /// Document would end up as it started
    Unchanged,
}

/// Simulated effect on one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePreview {
    /// Document path
    pub path: String,
    /// Kind of change
    pub change: FileChange,
    /// Size before, in bytes
    pub size_before: u64,
    /// Size after, in bytes
    pub size_after: u64,
    /// Lines that would be added
    pub lines_added: usize,
    /// Lines that would be removed
    pub lines_removed: usize,
}

/// Simulated effects of a whole suggestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPreview {
    /// Affected documents in first-touch order
    pub files: Vec<FilePreview>,
    /// Net change in bytes across all documents
    pub total_size_delta: i64,
}

fn line_stats(before: &str, after: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(before, after);
    let mut added = 0;
    let mut removed = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, removed)
}

/// Simulate every operation of `suggestion` and describe the result
pub async fn build_preview(
    suggestion: &Suggestion,
    documents: &dyn DocumentStore,
) -> ExecutionResult<ExecutionPreview> {
    let mut state = WorkingSet::new(documents);
    for operation in &suggestion.operations {
        let effects = plan_operation(operation, &mut state).await?;
        state.apply(&effects);
    }

    let mut preview = ExecutionPreview::default();
    for path in state.touched() {
        let before = state.original(path);
        let after = state.current(path);

        let change = match (before, after) {
            (None, Some(_)) => FileChange::Create,
            (Some(_), None) => FileChange::Delete,
            (Some(b), Some(a)) if b != a => FileChange::Modify,
            _ => FileChange::Unchanged,
        };

        let before = before.unwrap_or_default();
        let after = after.unwrap_or_default();
        let (lines_added, lines_removed) = line_stats(before, after);
        let size_before = before.len() as u64;
        let size_after = after.len() as u64;

        preview.total_size_delta += size_after as i64 - size_before as i64;
        preview.files.push(FilePreview {
            path: path.clone(),
            change,
            size_before,
            size_after,
            lines_added,
            lines_removed,
        });
    }

    Ok(preview)
}
