//! Knowforge Versions - Append-only version history for knowledge files
//!
//! Every document keeps an ordered list of versions. Refactorings record a
//! pre-image snapshot tagged with their snapshot id before mutating a
//! document, and a rollback appends a new version instead of rewriting history.

pub mod error;
pub mod models;
pub mod store;

pub use error::{VersionError, VersionResult};
pub use models::{
    ChangeType, SnapshotInfo, SnapshotRequest, VersionMetadata, VersionRecord,
    PRE_REFACTORING_PREFIX,
};
pub use store::{FileVersionStore, VersionStore};
