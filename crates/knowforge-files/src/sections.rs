//! Heading-delimited section extraction
//!
//! A section named `S` starts at the heading line whose text equals `S`
//! (case-insensitive, any level) and runs until the next heading of the same
//! or higher level. Headings inside fenced code blocks are ignored.

use crate::error::{DocumentError, DocumentResult};

/// A heading found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Heading level, 1 to 6
    pub level: usize,
    /// Heading text without the leading `#` markers
    pub text: String,
    /// Zero-based line index of the heading
    pub line: usize,
}

/// Extracts sections from markdown-style documents
pub struct SectionExtractor;

impl SectionExtractor {
    /// All headings in document order
    pub fn headings(content: &str) -> Vec<Heading> {
        let mut headings = Vec::new();
        let mut in_fence = false;

        for (line_no, line) in content.lines().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if let Some(heading) = parse_heading(line, line_no) {
                headings.push(heading);
            }
        }

        headings
    }

    /// Extract one section, heading line included
    pub fn extract(path: &str, content: &str, section: &str) -> DocumentResult<String> {
        let wanted = section.trim().to_lowercase();
        let headings = Self::headings(content);

        let start = headings
            .iter()
            .position(|h| h.text.to_lowercase() == wanted)
            .ok_or_else(|| DocumentError::SectionNotFound {
                path: path.to_string(),
                section: section.to_string(),
            })?;

        let heading = &headings[start];
        let end_line = headings[start + 1..]
            .iter()
            .find(|h| h.level <= heading.level)
            .map(|h| h.line);

        let lines: Vec<&str> = content.lines().collect();
        let end_line = end_line.unwrap_or(lines.len());
        let body = lines[heading.line..end_line].join("\n");
        Ok(body.trim_end().to_string())
    }

    /// Extract the listed sections joined by blank lines.
    ///
    /// An empty list selects the whole document.
    pub fn extract_many(path: &str, content: &str, sections: &[String]) -> DocumentResult<String> {
        if sections.is_empty() {
            return Ok(content.trim_end().to_string());
        }

        let mut parts = Vec::with_capacity(sections.len());
        for section in sections {
            parts.push(Self::extract(path, content, section)?);
        }
        Ok(parts.join("\n\n"))
    }

    /// Whether `content` has a heading named `section`
    pub fn has_section(content: &str, section: &str) -> bool {
        let wanted = section.trim().to_lowercase();
        Self::headings(content)
            .iter()
            .any(|h| h.text.to_lowercase() == wanted)
    }
}

fn parse_heading(line: &str, line_no: usize) -> Option<Heading> {
    let trimmed = line.trim_start();
    // more than three spaces of indent is a code block
    if line.len() - trimmed.len() > 3 {
        return None;
    }

    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }

    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }

    let text = rest.trim().trim_end_matches('#').trim().to_string();
    Some(Heading {
        level,
        text,
        line: line_no,
    })
}
