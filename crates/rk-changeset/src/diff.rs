// diff.rs — Line diffs between two versions of a rule document.
//
// Lines are split on '\n' (not `str::lines`) so that a trailing newline is a
// real, diffable line and both sides can be rebuilt byte-exactly from the
// diff. Alignment is the classic longest-common-subsequence table; on ties
// the old line is removed before the new line is added, which keeps the
// output stable for identical inputs.
//
// A `DocumentDiff` diffs the metadata block and the body separately. When
// both changed, rendering separates them with a single elision line so the
// reader does not assume the two blocks are adjacent.

use serde::{Deserialize, Serialize};

use crate::document::Framing;

/// Line used between non-adjacent diff blocks.
pub const ELISION: &str = " ...";

/// How a line relates the old text to the new text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiffMarker {
    Unchanged,
    Added,
    Removed,
}

impl DiffMarker {
    /// The single-character prefix used in a rendered `diff` block.
    pub fn prefix(self) -> char {
        match self {
            DiffMarker::Unchanged => ' ',
            DiffMarker::Added => '+',
            DiffMarker::Removed => '-',
        }
    }
}

/// One line of a diff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffLine {
    pub marker: DiffMarker,
    pub text: String,
}

impl DiffLine {
    fn new(marker: DiffMarker, text: &str) -> Self {
        Self {
            marker,
            text: text.to_string(),
        }
    }

    pub fn is_change(&self) -> bool {
        self.marker != DiffMarker::Unchanged
    }
}

/// Compute the line diff between `old` and `new`.
pub fn line_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();
    let n = old_lines.len();
    let m = new_lines.len();

    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old_lines[i] == new_lines[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut i = 0;
    let mut j = 0;
    let mut out = Vec::with_capacity(n.max(m));
    while i < n && j < m {
        if old_lines[i] == new_lines[j] {
            out.push(DiffLine::new(DiffMarker::Unchanged, old_lines[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(DiffLine::new(DiffMarker::Removed, old_lines[i]));
            i += 1;
        } else {
            out.push(DiffLine::new(DiffMarker::Added, new_lines[j]));
            j += 1;
        }
    }
    out.extend(old_lines[i..].iter().map(|l| DiffLine::new(DiffMarker::Removed, l)));
    out.extend(new_lines[j..].iter().map(|l| DiffLine::new(DiffMarker::Added, l)));
    out
}

/// Rebuild the old text from a diff (unchanged + removed lines).
pub fn old_text(lines: &[DiffLine]) -> String {
    rebuild(lines, DiffMarker::Removed)
}

/// Rebuild the new text from a diff (unchanged + added lines).
pub fn new_text(lines: &[DiffLine]) -> String {
    rebuild(lines, DiffMarker::Added)
}

fn rebuild(lines: &[DiffLine], side: DiffMarker) -> String {
    lines
        .iter()
        .filter(|l| l.marker == DiffMarker::Unchanged || l.marker == side)
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render diff lines for a `diff` code block, one `<prefix><text>` per line.
///
/// With `context = Some(n)`, unchanged lines further than `n` lines from any
/// change are dropped and gaps are marked with [`ELISION`]. A trailing empty
/// unchanged line (the artifact of a final newline) is never rendered.
pub fn render_lines(lines: &[DiffLine], context: Option<usize>) -> Vec<String> {
    let mut lines = lines;
    if let Some((last, rest)) = lines.split_last() {
        if !last.is_change() && last.text.is_empty() {
            lines = rest;
        }
    }

    let keep: Vec<bool> = match context {
        None => vec![true; lines.len()],
        Some(radius) => {
            let mut keep = vec![false; lines.len()];
            for (idx, line) in lines.iter().enumerate() {
                if line.is_change() {
                    let start = idx.saturating_sub(radius);
                    let end = (idx + radius + 1).min(lines.len());
                    keep[start..end].iter_mut().for_each(|k| *k = true);
                }
            }
            keep
        }
    };

    let mut out = Vec::new();
    let mut skipped = false;
    for (line, kept) in lines.iter().zip(keep) {
        if !kept {
            skipped = true;
            continue;
        }
        if skipped && !out.is_empty() {
            out.push(ELISION.to_string());
        }
        skipped = false;
        out.push(format!("{}{}", line.marker.prefix(), line.text));
    }
    out
}

/// Diff of a rule document, metadata block and body considered separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDiff {
    pub metadata: Vec<DiffLine>,
    pub body: Vec<DiffLine>,
}

impl DocumentDiff {
    /// Diff two full document texts.
    pub fn between(old: &str, new: &str) -> Self {
        let old = Framing::split(old);
        let new = Framing::split(new);
        Self {
            metadata: line_diff(old.metadata_block, new.metadata_block),
            body: line_diff(old.body, new.body),
        }
    }

    pub fn metadata_changed(&self) -> bool {
        self.metadata.iter().any(DiffLine::is_change)
    }

    pub fn body_changed(&self) -> bool {
        self.body.iter().any(DiffLine::is_change)
    }

    pub fn is_empty(&self) -> bool {
        !self.metadata_changed() && !self.body_changed()
    }

    /// Render the changed blocks as lines of a `diff` code block. Unchanged
    /// blocks are omitted entirely; when both changed, one [`ELISION`] line
    /// separates them.
    pub fn render(&self, context: Option<usize>) -> Vec<String> {
        let mut out = Vec::new();
        if self.metadata_changed() {
            out.extend(render_lines(&self.metadata, context));
        }
        if self.body_changed() {
            if !out.is_empty() {
                out.push(ELISION.to_string());
            }
            out.extend(render_lines(&self.body, context));
        }
        out
    }
}
