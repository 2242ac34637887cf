//! Knowforge storage
//!
//! Storage layout, multi-format configuration loading, and the tolerant JSON
//! history documents that back the refactoring audit trail.

pub mod config_loader;
pub mod error;
pub mod json_store;
pub mod layout;

pub use config_loader::{ConfigFormat, ConfigLoader};
pub use error::{IoOperation, StorageError, StorageResult};
pub use json_store::{write_atomic, KeyedHistoryFile, ListHistoryFile, LoadReport};
pub use layout::StorageLayout;
