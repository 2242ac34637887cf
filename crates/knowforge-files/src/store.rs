//! Document store port and its file-system implementation
//!
//! All mutation of the live document tree goes through [`DocumentStore`], so
//! content hashes reported by `read` and `write` stay consistent with what is
//! on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use knowforge_storage::write_atomic;

use crate::error::{DocumentError, DocumentResult};
use crate::hashing::ContentHasher;
use crate::paths::DocumentPath;

/// Content of a document together with its hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContent {
    /// Document text
    pub content: String,
    /// SHA-256 of `content`
    pub content_hash: String,
}

impl DocumentContent {
    /// Wrap `content`, computing its hash
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let content_hash = ContentHasher::compute_hash(&content);
        Self {
            content,
            content_hash,
        }
    }

    /// Size of the content in bytes
    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Read/write/hash access to the live document tree
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document and its content hash
    async fn read(&self, path: &str) -> DocumentResult<DocumentContent>;

    /// Write a document, creating parent directories; returns the new hash
    async fn write(&self, path: &str, content: &str) -> DocumentResult<String>;

    /// Remove a document from the live tree
    async fn delete(&self, path: &str) -> DocumentResult<()>;

    /// Whether a document exists
    async fn exists(&self, path: &str) -> DocumentResult<bool>;

    /// Hash `content` the way this store does
    fn hash(&self, content: &str) -> String {
        ContentHasher::compute_hash(content)
    }
}

/// Document store backed by a directory on disk
///
/// ```rust
/// use knowforge_files::{DocumentStore, FileSystemDocumentStore};
///
/// # tokio_test::block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// let store = FileSystemDocumentStore::new(dir.path());
///
/// let hash = store.write("notes/todo.md", "- [ ] write docs\n").await.unwrap();
/// let doc = store.read("notes/todo.md").await.unwrap();
/// assert_eq!(doc.content_hash, hash);
///
/// // Paths may not leave the workspace
/// assert!(store.read("../outside.md").await.is_err());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct FileSystemDocumentStore {
    root: PathBuf,
    max_content_bytes: usize,
    reserved_dir: Option<String>,
}

impl FileSystemDocumentStore {
    /// Default upper bound on a single document
    pub const DEFAULT_MAX_CONTENT_BYTES: usize = 100 * 1024 * 1024;

    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_content_bytes: Self::DEFAULT_MAX_CONTENT_BYTES,
            reserved_dir: None,
        }
    }

    /// Override the maximum document size accepted by `write`
    pub fn with_max_content_bytes(mut self, max_content_bytes: usize) -> Self {
        self.max_content_bytes = max_content_bytes;
        self
    }

    /// Refuse every path under `dir`, a workspace-relative directory that
    /// holds state which is not a document
    pub fn with_reserved_dir(mut self, dir: &str) -> DocumentResult<Self> {
        self.reserved_dir = Some(DocumentPath::normalize(dir)?);
        Ok(self)
    }

    /// Workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserved directory, if any
    pub fn reserved_dir(&self) -> Option<&str> {
        self.reserved_dir.as_deref()
    }

    fn resolve(&self, path: &str) -> DocumentResult<PathBuf> {
        if let Some(reserved) = &self.reserved_dir {
            let normalized = DocumentPath::normalize(path)?;
            if DocumentPath::is_within(&normalized, reserved) {
                return Err(DocumentError::InvalidPath(format!(
                    "Path is inside the reserved directory {}: {}",
                    reserved, path
                )));
            }
        }
        DocumentPath::resolve(&self.root, path)
    }
}

#[async_trait]
impl DocumentStore for FileSystemDocumentStore {
    async fn read(&self, path: &str) -> DocumentResult<DocumentContent> {
        let resolved = self.resolve(path)?;
        match fs::read_to_string(&resolved).await {
            Ok(content) => Ok(DocumentContent::new(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DocumentError::NotFound(path.to_string()))
            }
            Err(e) => Err(DocumentError::io(path, e)),
        }
    }

    async fn write(&self, path: &str, content: &str) -> DocumentResult<String> {
        if content.len() > self.max_content_bytes {
            return Err(DocumentError::InvalidContent(format!(
                "Document {} exceeds {} bytes",
                path, self.max_content_bytes
            )));
        }

        let resolved = self.resolve(path)?;
        debug!(path = %path, content_len = content.len(), "Writing document");
        write_atomic(&resolved, content).await?;

        let content_hash = self.hash(content);
        info!(path = %path, content_hash = %content_hash, "Document written");
        Ok(content_hash)
    }

    async fn delete(&self, path: &str) -> DocumentResult<()> {
        let resolved = self.resolve(path)?;
        match fs::remove_file(&resolved).await {
            Ok(()) => {
                info!(path = %path, "Document deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DocumentError::NotFound(path.to_string()))
            }
            Err(e) => Err(DocumentError::io(path, e)),
        }
    }

    async fn exists(&self, path: &str) -> DocumentResult<bool> {
        let resolved = self.resolve(path)?;
        let exists = fs::try_exists(&resolved)
            .await
            .map_err(|e| DocumentError::io(path, e))?;
        Ok(exists && resolved.is_file())
    }
}
