//! Content hashing for change detection

use sha2::{Digest, Sha256};

/// Computes content hashes used for optimistic concurrency checks
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl ContentHasher {
    /// Computes SHA-256 hash of content as lowercase hex
    pub fn compute_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Whether `content` hashes to `expected`
    pub fn matches(content: &str, expected: &str) -> bool {
        Self::compute_hash(content) == expected
    }
}
