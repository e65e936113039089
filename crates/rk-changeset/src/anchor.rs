// anchor.rs — Locate where an anchored addition goes.
//
// An anchor is up to two lines of text that should sit immediately before
// the inserted content. Matching is line-based and whitespace-tolerant: each
// body line is compared to the corresponding anchor line after trimming.
// The first match scanning top to bottom wins. A miss is an expected outcome
// and resolves to `Fallback` (append at end of document).

/// Where an anchored edit should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPosition {
    /// Insert immediately after the matched span.
    After {
        /// Zero-based index of the last matched line.
        last_line: usize,
        /// Byte offset just past the last matched line (before its newline).
        byte_offset: usize,
    },
    /// The anchor was not found (or the body is empty): append instead.
    Fallback,
}

impl AnchorPosition {
    pub fn is_fallback(&self) -> bool {
        matches!(self, AnchorPosition::Fallback)
    }
}

/// Resolve `anchor` inside `body`.
pub fn resolve(body: &str, anchor: &str) -> AnchorPosition {
    let anchor_lines: Vec<&str> = anchor.trim_matches('\n').split('\n').map(str::trim).collect();
    if body.is_empty() || anchor_lines.iter().all(|l| l.is_empty()) {
        return AnchorPosition::Fallback;
    }

    let body_lines: Vec<&str> = body.split('\n').collect();
    let span = anchor_lines.len();
    if span > body_lines.len() {
        tracing::debug!(anchor_lines = span, "anchor longer than body");
        return AnchorPosition::Fallback;
    }

    // Byte offset of the end of each line (excluding its newline).
    let mut line_ends = Vec::with_capacity(body_lines.len());
    let mut offset = 0;
    for line in &body_lines {
        offset += line.len();
        line_ends.push(offset);
        offset += 1;
    }

    for start in 0..=(body_lines.len() - span) {
        let matched = anchor_lines
            .iter()
            .enumerate()
            .all(|(j, a)| body_lines[start + j].trim() == *a);
        if matched {
            let last_line = start + span - 1;
            return AnchorPosition::After {
                last_line,
                byte_offset: line_ends[last_line],
            };
        }
    }

    tracing::debug!(anchor = %anchor.trim(), "anchor not found");
    AnchorPosition::Fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "# Style\n\n- Use tabs\n- Wrap at 100\n\n# Tests\n- Name by behavior\n";

    #[test]
    fn single_line_anchor_resolves_after_line() {
        let pos = resolve(BODY, "- Use tabs");
        let AnchorPosition::After {
            last_line,
            byte_offset,
        } = pos
        else {
            panic!("expected match, got {:?}", pos);
        };
        assert_eq!(last_line, 2);
        assert_eq!(&BODY[..byte_offset], "# Style\n\n- Use tabs");
    }

    #[test]
    fn two_line_anchor_matches_with_whitespace_differences() {
        let pos = resolve(BODY, "  - Use tabs  \n- Wrap at 100\t\n");
        match pos {
            AnchorPosition::After { last_line, .. } => assert_eq!(last_line, 3),
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn first_match_wins() {
        let body = "a\nx\na\nx\n";
        match resolve(body, "a") {
            AnchorPosition::After { last_line, .. } => assert_eq!(last_line, 0),
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn missing_anchor_falls_back() {
        assert!(resolve(BODY, "- Nothing like this").is_fallback());
    }

    #[test]
    fn empty_body_or_anchor_falls_back() {
        assert!(resolve("", "anything").is_fallback());
        assert!(resolve(BODY, "\n\n").is_fallback());
    }

    #[test]
    fn partial_line_does_not_match() {
        assert!(resolve(BODY, "Use tabs").is_fallback());
    }

    #[test]
    fn anchor_on_final_line_without_newline() {
        let body = "one\ntwo";
        match resolve(body, "two") {
            AnchorPosition::After { byte_offset, .. } => assert_eq!(byte_offset, body.len()),
            other => panic!("expected match, got {:?}", other),
        }
    }
}
