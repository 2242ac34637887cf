//! Suggestion registry port
//!
//! Suggestions are produced by an external generator; the pipeline only
//! looks them up by id.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ExecutionError, ExecutionResult};
use crate::models::Suggestion;

/// Read access to generated suggestions
#[async_trait]
pub trait SuggestionRegistry: Send + Sync {
    /// Look up a suggestion by id
    async fn get_suggestion(&self, suggestion_id: &str) -> Option<Suggestion>;
}

/// Registry holding suggestions in memory
#[derive(Default)]
pub struct InMemorySuggestionRegistry {
    suggestions: RwLock<HashMap<String, Suggestion>>,
}

impl InMemorySuggestionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a suggestion, replacing any suggestion with the same id
    pub async fn register(&self, suggestion: Suggestion) -> ExecutionResult<()> {
        if suggestion.suggestion_id.trim().is_empty() {
            return Err(ExecutionError::MissingParameter("suggestion_id".to_string()));
        }
        if !(0.0..=1.0).contains(&suggestion.confidence) {
            return Err(ExecutionError::ValidationError(format!(
                "Suggestion {} has confidence {} outside 0.0..=1.0",
                suggestion.suggestion_id, suggestion.confidence
            )));
        }

        debug!(
            suggestion_id = %suggestion.suggestion_id,
            refactoring_type = %suggestion.refactoring_type,
            operations = suggestion.operations.len(),
            "Suggestion registered"
        );
        self.suggestions
            .write()
            .await
            .insert(suggestion.suggestion_id.clone(), suggestion);
        Ok(())
    }

    /// Register every suggestion in a JSON array
    pub async fn register_json(&self, json: &str) -> ExecutionResult<usize> {
        let suggestions: Vec<Suggestion> = serde_json::from_str(json).map_err(|e| {
            ExecutionError::ValidationError(format!("Invalid suggestion document: {}", e))
        })?;
        let count = suggestions.len();
        for suggestion in suggestions {
            self.register(suggestion).await?;
        }
        Ok(count)
    }

    /// Number of registered suggestions
    pub async fn len(&self) -> usize {
        self.suggestions.read().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.suggestions.read().await.is_empty()
    }
}

#[async_trait]
impl SuggestionRegistry for InMemorySuggestionRegistry {
    async fn get_suggestion(&self, suggestion_id: &str) -> Option<Suggestion> {
        self.suggestions.read().await.get(suggestion_id).cloned()
    }
}
