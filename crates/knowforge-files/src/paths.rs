//! Document path validation
//!
//! Document paths are workspace-relative (`notes/topic.md`). Every store
//! operation validates its path here before touching the file system.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{DocumentError, DocumentResult};

/// Maximum accepted path length
const MAX_PATH_LEN: usize = 4096;

/// Validates workspace-relative document paths
pub struct DocumentPath;

impl DocumentPath {
    /// Validate `path` and return it normalized with `/` separators
    pub fn normalize(path: &str) -> DocumentResult<String> {
        if path.trim().is_empty() {
            return Err(DocumentError::InvalidPath("Path cannot be empty".to_string()));
        }

        if path.len() > MAX_PATH_LEN {
            return Err(DocumentError::InvalidPath(format!(
                "Path cannot exceed {} characters",
                MAX_PATH_LEN
            )));
        }

        if path.contains('\0') {
            return Err(DocumentError::InvalidPath(
                "Path contains null bytes".to_string(),
            ));
        }

        let mut parts = Vec::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(DocumentError::InvalidPath(format!(
                        "Path escapes the workspace: {}",
                        path
                    )))
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(DocumentError::InvalidPath(format!(
                        "Path must be relative to the workspace: {}",
                        path
                    )))
                }
            }
        }

        if parts.is_empty() {
            return Err(DocumentError::InvalidPath(format!(
                "Path does not name a document: {}",
                path
            )));
        }

        Ok(parts.join("/"))
    }

    /// Resolve a validated path against the workspace root
    pub fn resolve(root: &Path, path: &str) -> DocumentResult<PathBuf> {
        let normalized = Self::normalize(path)?;
        let resolved = root.join(&normalized);
        debug!(original_path = %path, resolved_path = ?resolved, "Path validated and resolved");
        Ok(resolved)
    }

    /// Whether normalized `path` is `dir` or lies beneath it
    pub fn is_within(path: &str, dir: &str) -> bool {
        path == dir
            || path
                .strip_prefix(dir)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Sibling path of `path` with the file name replaced by `new_name`
    pub fn sibling(path: &str, new_name: &str) -> DocumentResult<String> {
        let normalized = Self::normalize(path)?;
        if new_name.contains('/') || new_name.contains('\\') {
            return Err(DocumentError::InvalidPath(format!(
                "New name must not contain a directory: {}",
                new_name
            )));
        }

        let sibling = match normalized.rsplit_once('/') {
            Some((parent, _)) => format!("{}/{}", parent, new_name),
            None => new_name.to_string(),
        };
        Self::normalize(&sibling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative_paths() {
        assert_eq!(DocumentPath::normalize("a.md").unwrap(), "a.md");
        assert_eq!(DocumentPath::normalize("./notes/a.md").unwrap(), "notes/a.md");
    }

    #[test]
    fn test_rejects_empty_path() {
        assert!(DocumentPath::normalize("").is_err());
        assert!(DocumentPath::normalize("   ").is_err());
    }

    #[test]
    fn test_rejects_null_bytes() {
        assert!(DocumentPath::normalize("a\0b.md").is_err());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        assert!(DocumentPath::normalize("../secret.md").is_err());
        assert!(DocumentPath::normalize("notes/../../x.md").is_err());
    }

    #[test]
    fn test_rejects_absolute_paths() {
        assert!(DocumentPath::normalize("/etc/passwd").is_err());
    }

    #[test]
    fn test_is_within() {
        assert!(DocumentPath::is_within(".knowforge", ".knowforge"));
        assert!(DocumentPath::is_within(".knowforge/versions/a.json", ".knowforge"));
        assert!(!DocumentPath::is_within(".knowforge2/a.md", ".knowforge"));
        assert!(!DocumentPath::is_within("notes/.knowforge", ".knowforge"));
    }

    #[test]
    fn test_sibling() {
        assert_eq!(
            DocumentPath::sibling("notes/old.md", "new.md").unwrap(),
            "notes/new.md"
        );
        assert_eq!(DocumentPath::sibling("old.md", "new.md").unwrap(), "new.md");
        assert!(DocumentPath::sibling("old.md", "dir/new.md").is_err());
    }
}
