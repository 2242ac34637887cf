//! Pre-execution validation of a suggestion's operations
//!
//! Operations are simulated in order against a working set, so later
//! operations see the documents created, moved or deleted by earlier ones.
//! Nothing is written.

use tracing::{debug, warn};

use knowforge_files::DocumentStore;

use crate::models::{Suggestion, ValidationIssue};
use crate::planner::{plan_operation, WorkingSet};

/// Validates suggestions before they are executed
pub struct SuggestionValidator;

impl SuggestionValidator {
    /// Every problem that would stop `suggestion` from executing
    pub async fn validate(suggestion: &Suggestion, documents: &dyn DocumentStore) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if suggestion.operations.is_empty() {
            issues.push(ValidationIssue {
                operation_id: None,
                message: format!("Suggestion {} has no operations", suggestion.suggestion_id),
                missing_parameter: Some("operations".to_string()),
            });
            return issues;
        }

        let mut state = WorkingSet::new(documents);
        for operation in &suggestion.operations {
            match plan_operation(operation, &mut state).await {
                Ok(effects) => state.apply(&effects),
                Err(e) => {
                    warn!(
                        suggestion_id = %suggestion.suggestion_id,
                        operation_id = %operation.operation_id,
                        error = %e,
                        "Operation failed validation"
                    );
                    issues.push(ValidationIssue {
                        operation_id: Some(operation.operation_id.clone()),
                        message: e.to_string(),
                        missing_parameter: e.missing_parameter().map(str::to_string),
                    });
                }
            }
        }

        debug!(
            suggestion_id = %suggestion.suggestion_id,
            operations = suggestion.operations.len(),
            issues = issues.len(),
            "Validated suggestion"
        );
        issues
    }

    /// One-line summary of validation issues
    pub fn summarize(issues: &[ValidationIssue]) -> String {
        let details: Vec<String> = issues
            .iter()
            .map(|issue| match &issue.operation_id {
                Some(id) => format!("{}: {}", id, issue.message),
                None => issue.message.clone(),
            })
            .collect();
        format!("Validation failed: {}", details.join("; "))
    }
}
