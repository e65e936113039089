// document.rs — Rule documents: a metadata block followed by a body.
//
// On disk a rule document looks like:
//
//   ---
//   description: Prefer functional React components
//   globs: "*.tsx", "*.jsx"
//   ---
//
//   Body text...
//
// The metadata block is optional. When it is absent the whole text is body.
// Metadata lines other than `description:` and `globs:` are kept verbatim so
// re-serializing a document never drops fields we do not model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current text of rule documents keyed by path. Paths missing from the map
/// do not exist yet.
pub type DocumentSnapshot = BTreeMap<String, String>;

/// The delimiter line that opens and closes the metadata block.
pub const DELIMITER: &str = "---";

/// Metadata carried in a rule document's header block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Human-readable description of when the rule applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Glob patterns of files the rule applies to, in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub globs: Vec<String>,

    /// Header lines this model does not interpret, preserved in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

impl DocumentMetadata {
    /// True when no field is set, i.e. no header block is needed.
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.globs.is_empty() && self.extra.is_empty()
    }

    /// Parse the lines between the two delimiter lines.
    pub fn parse_block(block: &str) -> Self {
        let mut metadata = Self::default();
        for line in block.lines() {
            if let Some(value) = line.strip_prefix("description:") {
                let value = value.trim();
                if !value.is_empty() {
                    metadata.description = Some(value.to_string());
                }
            } else if let Some(value) = line.strip_prefix("globs:") {
                metadata.globs = parse_globs(value);
            } else if !line.trim().is_empty() {
                metadata.extra.push(line.to_string());
            }
        }
        metadata
    }

    /// Render the globs as a comma-separated list of quoted patterns.
    pub fn globs_line(&self) -> String {
        format_globs(&self.globs)
    }

    /// Serialize the full header block, including both delimiters and the
    /// single blank line that separates it from the body.
    pub fn to_block(&self) -> String {
        let mut out = String::new();
        out.push_str(DELIMITER);
        out.push('\n');
        if let Some(description) = &self.description {
            out.push_str(&format!("description: {}\n", description));
        }
        if !self.globs.is_empty() {
            out.push_str(&format!("globs: {}\n", self.globs_line()));
        }
        for line in &self.extra {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(DELIMITER);
        out.push_str("\n\n");
        out
    }
}

/// Split a `globs:` value into patterns, accepting both the quoted list form
/// and a single bare pattern.
///
/// Only commas outside quotes and outside `{...}` alternations separate
/// patterns, so `"**/*.{ts,tsx}"` stays one pattern.
pub fn parse_globs(value: &str) -> Vec<String> {
    let mut patterns = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut braces = 0usize;
    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            '{' => {
                braces += 1;
                current.push(c);
            }
            '}' => {
                braces = braces.saturating_sub(1);
                current.push(c);
            }
            ',' if !quoted && braces == 0 => patterns.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    patterns.push(current);

    patterns
        .iter()
        .map(|g| g.trim().trim_matches('"').trim())
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

/// Format patterns the way they are written in a header block.
pub fn format_globs(globs: &[String]) -> String {
    globs
        .iter()
        .map(|g| format!("\"{}\"", g))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The raw framing of a document's text, borrowed from the input.
///
/// `header` is everything up to and including the closing delimiter line
/// plus at most one blank line; `body` is the rest. `metadata_block` is the
/// text strictly between the delimiters. For a document without a header
/// block, `header` and `metadata_block` are empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing<'a> {
    pub header: &'a str,
    pub metadata_block: &'a str,
    pub body: &'a str,
}

impl<'a> Framing<'a> {
    /// Split `text` into header and body.
    pub fn split(text: &'a str) -> Self {
        let opening = "---\n";
        let Some(rest) = text.strip_prefix(opening) else {
            return Self::bare(text);
        };

        // Locate the closing delimiter line within `rest`.
        let (block_end, after_delimiter) = if rest.starts_with(opening) {
            (0, opening.len())
        } else if let Some(pos) = rest.find("\n---\n") {
            (pos + 1, pos + 1 + opening.len())
        } else if rest.ends_with("\n---") {
            (rest.len() - DELIMITER.len(), rest.len())
        } else {
            return Self::bare(text);
        };

        let mut header_len = opening.len() + after_delimiter;
        if text[header_len..].starts_with('\n') {
            header_len += 1;
        }

        Self {
            header: &text[..header_len],
            metadata_block: &rest[..block_end],
            body: &text[header_len..],
        }
    }

    fn bare(text: &'a str) -> Self {
        Self {
            header: "",
            metadata_block: "",
            body: text,
        }
    }

    /// True when the text carried a header block.
    pub fn has_header(&self) -> bool {
        !self.header.is_empty()
    }
}

/// A path-addressed rule document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDocument {
    /// Repository-relative path; unique key of the document.
    pub path: String,
    pub metadata: DocumentMetadata,
    pub body: String,
}

impl RuleDocument {
    pub fn new(path: impl Into<String>, metadata: DocumentMetadata, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metadata,
            body: body.into(),
        }
    }

    /// Parse raw document text. Never fails: text without a header block is
    /// all body.
    pub fn parse(path: impl Into<String>, text: &str) -> Self {
        let framing = Framing::split(text);
        Self {
            path: path.into(),
            metadata: DocumentMetadata::parse_block(framing.metadata_block),
            body: framing.body.to_string(),
        }
    }

    /// Serialize to canonical text: header block (when any field is set)
    /// followed by the body.
    pub fn serialize(&self) -> String {
        if self.metadata.is_empty() {
            return self.body.clone();
        }
        let mut out = self.metadata.to_block();
        out.push_str(&self.body);
        out
    }

    /// File name without directory or extension.
    pub fn name(&self) -> &str {
        let file = self.path.rsplit('/').next().unwrap_or(&self.path);
        file.split('.').next().unwrap_or(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "---\ndescription: Use hooks\nglobs: \"*.tsx\", \"*.jsx\"\n---\n\n# React\n- Prefer hooks\n";

    #[test]
    fn parse_reads_metadata_and_body() {
        let doc = RuleDocument::parse(".cursor/rules/react.mdc", CANONICAL);
        assert_eq!(doc.metadata.description.as_deref(), Some("Use hooks"));
        assert_eq!(doc.metadata.globs, vec!["*.tsx", "*.jsx"]);
        assert_eq!(doc.body, "# React\n- Prefer hooks\n");
        assert_eq!(doc.name(), "react");
    }

    #[test]
    fn canonical_text_round_trips() {
        let doc = RuleDocument::parse("a.mdc", CANONICAL);
        assert_eq!(doc.serialize(), CANONICAL);
    }

    #[test]
    fn round_trip_ignores_whitespace_in_metadata_values() {
        let loose = "---\ndescription:    Use hooks   \nglobs:  \"*.tsx\" ,\"*.jsx\"\n---\n\nbody\n";
        let doc = RuleDocument::parse("a.mdc", loose);
        let again = RuleDocument::parse("a.mdc", &doc.serialize());
        assert_eq!(doc, again);
        assert_eq!(
            doc.serialize(),
            "---\ndescription: Use hooks\nglobs: \"*.tsx\", \"*.jsx\"\n---\n\nbody\n"
        );
    }

    #[test]
    fn text_without_delimiter_is_all_body() {
        let doc = RuleDocument::parse("a.mdc", "just a body\n");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "just a body\n");
        assert_eq!(doc.serialize(), "just a body\n");
    }

    #[test]
    fn unclosed_header_is_treated_as_body() {
        let text = "---\ndescription: never closed\nbody";
        let framing = Framing::split(text);
        assert!(!framing.has_header());
        assert_eq!(framing.body, text);
    }

    #[test]
    fn bare_single_glob_is_accepted() {
        let doc = RuleDocument::parse("a.mdc", "---\nglobs: src/**/*.rs\n---\nbody");
        assert_eq!(doc.metadata.globs, vec!["src/**/*.rs"]);
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn commas_inside_a_pattern_do_not_split_it() {
        assert_eq!(parse_globs(r#" "**/*.{ts,tsx}""#), vec!["**/*.{ts,tsx}"]);
        assert_eq!(
            parse_globs(r#""src/*.{js,jsx}", "*.md""#),
            vec!["src/*.{js,jsx}", "*.md"]
        );
        assert_eq!(parse_globs(" src/**/*.{rs,toml}"), vec!["src/**/*.{rs,toml}"]);

        let text = "---\ndescription: Frontend\nglobs: \"**/*.{ts,tsx}\"\n---\n\nbody\n";
        let doc = RuleDocument::parse("a.mdc", text);
        assert_eq!(doc.metadata.globs, vec!["**/*.{ts,tsx}"]);
        assert_eq!(doc.serialize(), text);
    }

    #[test]
    fn unknown_header_lines_survive_serialization() {
        let text = "---\ndescription: d\nglobs: \"*.rs\"\nalwaysApply: false\n---\n\nbody";
        let doc = RuleDocument::parse("a.mdc", text);
        assert_eq!(doc.metadata.extra, vec!["alwaysApply: false"]);
        assert_eq!(doc.serialize(), text);
    }

    #[test]
    fn framing_keeps_header_bytes_verbatim() {
        let text = "---\ndescription:  spaced\n---\n\nbody\n";
        let framing = Framing::split(text);
        assert_eq!(framing.header, "---\ndescription:  spaced\n---\n\n");
        assert_eq!(framing.metadata_block, "description:  spaced\n");
        assert_eq!(framing.body, "body\n");
    }

    #[test]
    fn empty_header_block_is_recognised() {
        let framing = Framing::split("---\n---\nbody");
        assert!(framing.has_header());
        assert_eq!(framing.metadata_block, "");
        assert_eq!(framing.body, "body");
    }
}
