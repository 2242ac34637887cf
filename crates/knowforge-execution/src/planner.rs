//! Operation semantics as file effects
//!
//! Each operation is turned into the list of document states it produces.
//! Validation and dry-run previews apply those effects to an in-memory
//! working set; real executions apply them to the document store. All three
//! share one definition of what an operation does.

use std::collections::{HashMap, HashSet};

use knowforge_files::{DocumentError, DocumentPath, DocumentStore, SectionExtractor};

use crate::error::{ExecutionError, ExecutionResult};
use crate::models::{Operation, OperationKind};

/// Separator placed between consolidated parts when none is given
pub const DEFAULT_SEPARATOR: &str = "\n\n";

/// New state of one document; `None` removes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEffect {
    /// Normalized document path
    pub path: String,
    /// Content after the operation
    pub content: Option<String>,
}

impl FileEffect {
    fn write(path: String, content: String) -> Self {
        Self {
            path,
            content: Some(content),
        }
    }

    fn remove(path: String) -> Self {
        Self { path, content: None }
    }
}

/// Document contents as seen by a sequence of simulated operations
pub struct WorkingSet<'a> {
    documents: &'a dyn DocumentStore,
    current: HashMap<String, Option<String>>,
    originals: HashMap<String, Option<String>>,
    touched: Vec<String>,
}

impl<'a> WorkingSet<'a> {
    /// Working set reading through to `documents`
    pub fn new(documents: &'a dyn DocumentStore) -> Self {
        Self {
            documents,
            current: HashMap::new(),
            originals: HashMap::new(),
            touched: Vec::new(),
        }
    }

    /// Current content of `path`, `None` if it does not exist
    pub async fn content(&mut self, path: &str) -> ExecutionResult<Option<String>> {
        if let Some(content) = self.current.get(path) {
            return Ok(content.clone());
        }

        let content = match self.documents.read(path).await {
            Ok(doc) => Some(doc.content),
            Err(DocumentError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        self.originals.insert(path.to_string(), content.clone());
        self.current.insert(path.to_string(), content.clone());
        Ok(content)
    }

    /// Whether `path` currently exists
    pub async fn exists(&mut self, path: &str) -> ExecutionResult<bool> {
        Ok(self.content(path).await?.is_some())
    }

    /// Apply effects produced by [`plan_operation`]
    pub fn apply(&mut self, effects: &[FileEffect]) {
        for effect in effects {
            if !self.touched.contains(&effect.path) {
                self.touched.push(effect.path.clone());
            }
            self.current.insert(effect.path.clone(), effect.content.clone());
        }
    }

    /// Paths changed so far, in first-touch order
    pub fn touched(&self) -> &[String] {
        &self.touched
    }

    /// Content of `path` before any effect was applied
    pub fn original(&self, path: &str) -> Option<&str> {
        self.originals.get(path).and_then(|c| c.as_deref())
    }

    /// Content of `path` after all applied effects
    pub fn current(&self, path: &str) -> Option<&str> {
        self.current.get(path).and_then(|c| c.as_deref())
    }
}

fn required<'s>(value: &'s str, parameter: &str) -> ExecutionResult<&'s str> {
    if value.trim().is_empty() {
        Err(ExecutionError::MissingParameter(parameter.to_string()))
    } else {
        Ok(value)
    }
}

async fn existing_content(state: &mut WorkingSet<'_>, path: &str, role: &str) -> ExecutionResult<String> {
    state.content(path).await?.ok_or_else(|| {
        ExecutionError::ValidationError(format!("{} {} does not exist", role, path))
    })
}

async fn ensure_absent(state: &mut WorkingSet<'_>, path: &str, role: &str) -> ExecutionResult<()> {
    if state.exists(path).await? {
        return Err(ExecutionError::ValidationError(format!(
            "{} {} already exists",
            role, path
        )));
    }
    Ok(())
}

async fn plan_relocation(
    state: &mut WorkingSet<'_>,
    source: String,
    destination: String,
) -> ExecutionResult<Vec<FileEffect>> {
    if source == destination {
        return Err(ExecutionError::ValidationError(format!(
            "Destination {} is the same as the source",
            destination
        )));
    }
    let content = existing_content(state, &source, "Source").await?;
    ensure_absent(state, &destination, "Destination").await?;
    Ok(vec![
        FileEffect::write(destination, content),
        FileEffect::remove(source),
    ])
}

fn with_trailing_newline(mut content: String) -> String {
    if !content.ends_with('\n') {
        content.push('\n');
    }
    content
}

/// Effects of `operation` given the current `state`.
///
/// Fails with a missing-parameter, validation or document error when the
/// operation cannot be applied. `state` itself is not modified.
pub async fn plan_operation(
    operation: &Operation,
    state: &mut WorkingSet<'_>,
) -> ExecutionResult<Vec<FileEffect>> {
    if let OperationKind::Unknown = operation.kind {
        return Err(ExecutionError::UnknownOperation(operation.operation_id.clone()));
    }

    let target = DocumentPath::normalize(required(&operation.target_file, "target_file")?)?;

    match &operation.kind {
        OperationKind::Create { content } => {
            let content = content
                .as_ref()
                .ok_or_else(|| ExecutionError::MissingParameter("content".to_string()))?;
            ensure_absent(state, &target, "Document").await?;
            Ok(vec![FileEffect::write(target, content.clone())])
        }

        OperationKind::Modify { content } => {
            let content = content
                .as_ref()
                .ok_or_else(|| ExecutionError::MissingParameter("content".to_string()))?;
            existing_content(state, &target, "Document").await?;
            Ok(vec![FileEffect::write(target, content.clone())])
        }

        OperationKind::Delete => {
            existing_content(state, &target, "Document").await?;
            Ok(vec![FileEffect::remove(target)])
        }

        OperationKind::Move { destination } => {
            let destination = DocumentPath::normalize(required(destination, "destination")?)?;
            plan_relocation(state, target, destination).await
        }

        OperationKind::Rename { new_name } => {
            let destination = DocumentPath::sibling(&target, required(new_name, "new_name")?)?;
            plan_relocation(state, target, destination).await
        }

        OperationKind::Consolidate { sources, separator } => {
            if sources.is_empty() {
                return Err(ExecutionError::MissingParameter("sources".to_string()));
            }
            let separator = separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);

            let mut parts = Vec::with_capacity(sources.len());
            for source in sources {
                let path = DocumentPath::normalize(required(&source.file, "sources.file")?)?;
                if path == target {
                    return Err(ExecutionError::ValidationError(format!(
                        "Consolidation destination {} cannot also be a source",
                        target
                    )));
                }
                let content = existing_content(state, &path, "Source").await?;
                parts.push(SectionExtractor::extract_many(&path, &content, &source.sections)?);
            }

            let merged = parts.join(separator);
            let content = match state.content(&target).await? {
                Some(existing) => format!("{}{}{}", existing.trim_end(), separator, merged),
                None => merged,
            };
            Ok(vec![FileEffect::write(target, with_trailing_newline(content))])
        }

        OperationKind::Split { outputs } => {
            if outputs.is_empty() {
                return Err(ExecutionError::MissingParameter("outputs".to_string()));
            }
            let source = existing_content(state, &target, "Source").await?;

            let mut seen = HashSet::new();
            let mut effects = Vec::with_capacity(outputs.len());
            for output in outputs {
                let destination =
                    DocumentPath::normalize(required(&output.destination, "outputs.destination")?)?;
                if destination == target {
                    return Err(ExecutionError::ValidationError(format!(
                        "Split output {} cannot overwrite its source",
                        destination
                    )));
                }
                if !seen.insert(destination.clone()) {
                    return Err(ExecutionError::ValidationError(format!(
                        "Split output {} is listed more than once",
                        destination
                    )));
                }
                ensure_absent(state, &destination, "Split output").await?;

                let body = SectionExtractor::extract_many(&target, &source, &output.sections)?;
                let content = match &output.heading {
                    Some(heading) => format!("# {}\n\n{}", heading, body),
                    None => body,
                };
                effects.push(FileEffect::write(destination, with_trailing_newline(content)));
            }
            Ok(effects)
        }

        OperationKind::Unknown => Err(ExecutionError::UnknownOperation(
            operation.operation_id.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConsolidateSource, SplitOutput};
    use knowforge_files::FileSystemDocumentStore;
    use tempfile::TempDir;

    async fn store_with(files: &[(&str, &str)]) -> (TempDir, FileSystemDocumentStore) {
        let dir = TempDir::new().unwrap();
        let store = FileSystemDocumentStore::new(dir.path());
        for (path, content) in files {
            store.write(path, content).await.unwrap();
        }
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_requires_absent_target() {
        let (_dir, store) = store_with(&[("a.md", "x")]).await;
        let mut state = WorkingSet::new(&store);

        let op = Operation::new("o1", "a.md", OperationKind::Create { content: Some("y".into()) });
        assert!(matches!(
            plan_operation(&op, &mut state).await,
            Err(ExecutionError::ValidationError(_))
        ));

        let op = Operation::new("o2", "b.md", OperationKind::Create { content: Some("y".into()) });
        let effects = plan_operation(&op, &mut state).await.unwrap();
        assert_eq!(effects, vec![FileEffect::write("b.md".into(), "y".into())]);
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let (_dir, store) = store_with(&[("a.md", "x")]).await;
        let mut state = WorkingSet::new(&store);

        let cases = vec![
            (Operation::new("o1", "", OperationKind::Delete), "target_file"),
            (Operation::new("o2", "a.md", OperationKind::Modify { content: None }), "content"),
            (
                Operation::new("o3", "a.md", OperationKind::Move { destination: String::new() }),
                "destination",
            ),
            (
                Operation::new("o4", "a.md", OperationKind::Rename { new_name: " ".into() }),
                "new_name",
            ),
            (
                Operation::new("o5", "m.md", OperationKind::Consolidate { sources: vec![], separator: None }),
                "sources",
            ),
            (Operation::new("o6", "a.md", OperationKind::Split { outputs: vec![] }), "outputs"),
        ];

        for (op, parameter) in cases {
            let err = plan_operation(&op, &mut state).await.unwrap_err();
            assert_eq!(err.missing_parameter(), Some(parameter), "operation {}", op.operation_id);
        }
    }

    #[tokio::test]
    async fn test_unknown_operation_fails() {
        let (_dir, store) = store_with(&[]).await;
        let mut state = WorkingSet::new(&store);
        let op = Operation::new("o1", "a.md", OperationKind::Unknown);
        let err = plan_operation(&op, &mut state).await.unwrap_err();
        assert!(err.to_string().contains("Unknown operation type"));
    }

    #[tokio::test]
    async fn test_rename_stays_in_directory() {
        let (_dir, store) = store_with(&[("notes/old.md", "body")]).await;
        let mut state = WorkingSet::new(&store);
        let op = Operation::new("o1", "notes/old.md", OperationKind::Rename { new_name: "new.md".into() });

        let effects = plan_operation(&op, &mut state).await.unwrap();
        assert_eq!(
            effects,
            vec![
                FileEffect::write("notes/new.md".into(), "body".into()),
                FileEffect::remove("notes/old.md".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_move_rejects_existing_destination() {
        let (_dir, store) = store_with(&[("a.md", "a"), ("b.md", "b")]).await;
        let mut state = WorkingSet::new(&store);
        let op = Operation::new("o1", "a.md", OperationKind::Move { destination: "b.md".into() });
        assert!(plan_operation(&op, &mut state).await.is_err());
    }

    #[tokio::test]
    async fn test_consolidate_creates_then_appends() {
        let (_dir, store) = store_with(&[
            ("a.md", "# A\n\nalpha\n\n# Other\n\nzzz\n"),
            ("b.md", "# B\n\nbeta\n"),
        ])
        .await;
        let mut state = WorkingSet::new(&store);

        let op = Operation::new(
            "o1",
            "merged.md",
            OperationKind::Consolidate {
                sources: vec![
                    ConsolidateSource { file: "a.md".into(), sections: vec!["A".into()] },
                    ConsolidateSource { file: "b.md".into(), sections: vec![] },
                ],
                separator: None,
            },
        );
        let effects = plan_operation(&op, &mut state).await.unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(
            effects[0].content.as_deref(),
            Some("# A\n\nalpha\n\n# B\n\nbeta\n")
        );

        state.apply(&effects);
        let effects = plan_operation(&op, &mut state).await.unwrap();
        assert_eq!(
            effects[0].content.as_deref(),
            Some("# A\n\nalpha\n\n# B\n\nbeta\n\n# A\n\nalpha\n\n# B\n\nbeta\n")
        );
    }

    #[tokio::test]
    async fn test_consolidate_missing_section() {
        let (_dir, store) = store_with(&[("a.md", "# A\n\nalpha\n")]).await;
        let mut state = WorkingSet::new(&store);
        let op = Operation::new(
            "o1",
            "merged.md",
            OperationKind::Consolidate {
                sources: vec![ConsolidateSource { file: "a.md".into(), sections: vec!["Nope".into()] }],
                separator: None,
            },
        );
        let err = plan_operation(&op, &mut state).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Document(DocumentError::SectionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_split_writes_outputs_and_keeps_source() {
        let (_dir, store) = store_with(&[("guide.md", "# Setup\n\nstep\n\n# Usage\n\nrun\n")]).await;
        let mut state = WorkingSet::new(&store);
        let op = Operation::new(
            "o1",
            "guide.md",
            OperationKind::Split {
                outputs: vec![
                    SplitOutput { destination: "setup.md".into(), sections: vec!["Setup".into()], heading: None },
                    SplitOutput {
                        destination: "usage.md".into(),
                        sections: vec!["Usage".into()],
                        heading: Some("Using it".into()),
                    },
                ],
            },
        );

        let effects = plan_operation(&op, &mut state).await.unwrap();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].content.as_deref(), Some("# Setup\n\nstep\n"));
        assert_eq!(effects[1].content.as_deref(), Some("# Using it\n\n# Usage\n\nrun\n"));
        assert!(effects.iter().all(|e| e.path != "guide.md"));
    }

    #[tokio::test]
    async fn test_working_set_sees_earlier_effects() {
        let (_dir, store) = store_with(&[("a.md", "x")]).await;
        let mut state = WorkingSet::new(&store);

        let delete = Operation::new("o1", "a.md", OperationKind::Delete);
        let effects = plan_operation(&delete, &mut state).await.unwrap();
        state.apply(&effects);

        let recreate = Operation::new("o2", "a.md", OperationKind::Create { content: Some("y".into()) });
        assert!(plan_operation(&recreate, &mut state).await.is_ok());
        assert!(plan_operation(&delete, &mut state).await.is_err());

        assert_eq!(state.original("a.md"), Some("x"));
        assert_eq!(state.current("a.md"), None);
        assert_eq!(state.touched(), &["a.md".to_string()]);
    }
}
