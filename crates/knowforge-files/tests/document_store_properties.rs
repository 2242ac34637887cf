//! Property-based tests for the file-system document store

use knowforge_files::{ContentHasher, DocumentPath, DocumentStore, FileSystemDocumentStore, SectionExtractor};
use proptest::prelude::*;

// For any content, a write followed by a read returns the same content and hash
#[tokio::test]
async fn test_write_read_preserves_content_exactly() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSystemDocumentStore::new(temp_dir.path());

    for content in ["", "plain", "# Heading\n\nbody\n", "unicode: \u{00e9}\u{4e2d}\n\n\n"] {
        let hash = store.write("docs/sample.md", content).await.unwrap();
        let doc = store.read("docs/sample.md").await.unwrap();

        assert_eq!(doc.content, content);
        assert_eq!(doc.content_hash, hash);
        assert!(ContentHasher::matches(content, &hash));
    }
}

#[tokio::test]
async fn test_overwrite_replaces_content_and_leaves_no_temp_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSystemDocumentStore::new(temp_dir.path());

    store.write("a.md", "first").await.unwrap();
    store.write("a.md", "second").await.unwrap();

    assert_eq!(store.read("a.md").await.unwrap().content, "second");

    let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec!["a.md".to_string()]);
}

#[test]
fn prop_hash_is_64_hex_chars() {
    proptest!(|(content in ".*")| {
        let hash = ContentHasher::compute_hash(&content);
        prop_assert_eq!(hash.len(), 64);
        prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    });
}

#[test]
fn prop_normalized_paths_never_escape() {
    proptest!(|(segments in prop::collection::vec("[a-z.]{1,4}", 1..5))| {
        let path = segments.join("/");
        if let Ok(normalized) = DocumentPath::normalize(&path) {
            prop_assert!(!normalized.split('/').any(|part| part == ".."));
            prop_assert!(!normalized.starts_with('/'));
        }
    });
}

#[test]
fn prop_every_heading_is_extractable() {
    proptest!(|(names in prop::collection::btree_set("[a-z]{3,8}", 1..5))| {
        let doc: String = names
            .iter()
            .map(|name| format!("## {}\n\nbody of {}\n\n", name, name))
            .collect();

        for name in &names {
            let section = SectionExtractor::extract("doc.md", &doc, name).unwrap();
            let expected_heading = format!("## {}", name);
            let expected_body = format!("body of {}", name);
            prop_assert!(section.starts_with(&expected_heading));
            prop_assert!(section.contains(&expected_body));
        }
    });
}
