//! Token counting port

/// Counts tokens in document content for version metadata
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `content`
    fn count(&self, content: &str) -> usize;
}

/// Counts whitespace-separated words
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn count(&self, content: &str) -> usize {
        content.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_counter() {
        let counter = WhitespaceTokenCounter;
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("# Title\n\nsome  body text"), 5);
    }
}
