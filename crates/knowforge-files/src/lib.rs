//! Knowforge Files - Document store for knowledge files
//!
//! This crate owns every read and write of the live document tree:
//! - Hashed reads and atomic writes through the [`DocumentStore`] port
//! - Workspace-relative path validation
//! - Heading-delimited section extraction for consolidate/split operations
//! - Token counting for version metadata

#![warn(missing_docs)]

pub mod error;
pub mod hashing;
pub mod paths;
pub mod sections;
pub mod store;
pub mod tokens;

pub use error::{DocumentError, DocumentResult};
pub use hashing::ContentHasher;
pub use paths::DocumentPath;
pub use sections::{Heading, SectionExtractor};
pub use store::{DocumentContent, DocumentStore, FileSystemDocumentStore};
pub use tokens::{TokenCounter, WhitespaceTokenCounter};
