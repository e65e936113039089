// summary.rs — The long-lived summary comment for one review request.
//
// The summary is the durable home of the change log: its hidden
// `rule-changes` block holds every accepted proposal in acceptance order and
// the applied banner, once present, freezes it. Everything visible is
// derived: a merged diff per target file computed against the documents as
// they currently stand.

use super::{
    extract_hidden_block, hidden_block, visible_lines, APPLIED_SIGNATURE, CHANGES_TAG,
    SUMMARY_SIGNATURE,
};
use crate::changelog::ChangeLog;
use crate::diff::DocumentDiff;
use crate::document::DocumentSnapshot;
use crate::error::ChangeSetError;

/// Lines of unchanged context around each change in the summary diffs.
pub const SUMMARY_CONTEXT: usize = 3;

/// Text shown when the log has no entries.
pub const EMPTY_SUMMARY: &str = "No suggestions accepted yet.";

/// True when `body` is a summary comment.
pub fn is_summary(body: &str) -> bool {
    body.contains(SUMMARY_SIGNATURE)
}

/// True when a summary carries the applied banner on a line of its own.
pub fn is_applied(body: &str) -> bool {
    visible_lines(body).any(|line| line.trim() == APPLIED_SIGNATURE)
}

/// Render the summary for `log`, diffing against `documents`.
///
/// For an applied log, pass the documents as they were before the apply so
/// the diff still shows what was changed.
pub fn render_summary(
    log: &ChangeLog,
    documents: &DocumentSnapshot,
    apply_command: &str,
) -> Result<String, ChangeSetError> {
    let mut out = format!("{}\n\n", SUMMARY_SIGNATURE);

    if log.is_applied() {
        out.push_str(APPLIED_SIGNATURE);
        out.push('\n');
        out.push_str("These rules have been applied to the codebase. This review's suggestions are now locked.\n\n");
        out.push_str("Applied changes:\n");
    } else {
        out.push_str("Changes to be applied:\n");
    }

    if log.is_empty() {
        out.push_str(EMPTY_SUMMARY);
        out.push_str("\n\n");
    } else {
        for report in log.merge(documents)? {
            match documents.get(&report.path) {
                None => {
                    out.push_str(&format!("\nFile: `{}` (new file)\n```diff\n", report.path));
                    let text = report.text.strip_suffix('\n').unwrap_or(&report.text);
                    for line in text.split('\n') {
                        out.push_str(&format!("+{}\n", line));
                    }
                }
                Some(existing) => {
                    out.push_str(&format!("\nFile: `{}`\n```diff\n", report.path));
                    let diff = DocumentDiff::between(existing, &report.text);
                    for line in diff.render(Some(SUMMARY_CONTEXT)) {
                        out.push_str(&line);
                        out.push('\n');
                    }
                }
            }
            out.push_str("```\n");
        }

        if !log.is_applied() {
            out.push_str("\n**To apply these changes:**\n");
            out.push_str(&format!(
                "Add a new comment on this review with the text `{}` and nothing else.\n",
                apply_command
            ));
        }

        out.push('\n');
        out.push_str(&hidden_block(CHANGES_TAG, &log.to_payload()?));
        out.push('\n');
    }

    if !log.is_applied() {
        out.push_str(
            "\nℹ️ Once rules are applied, no further rule suggestions will be added to this review. \
             Always double check the generated commit before merging.",
        );
    }

    Ok(out)
}

/// Recover the change log from a summary body.
///
/// A summary without a `rule-changes` block has an empty log. The applied
/// flag is taken from the banner alone.
pub fn parse_summary(body: &str) -> Result<ChangeLog, ChangeSetError> {
    let applied = is_applied(body);
    match extract_hidden_block(body, CHANGES_TAG) {
        Some(json) => ChangeLog::from_payload(json, applied)
            .map_err(|e| ChangeSetError::InvalidMarker(format!("{}: {}", CHANGES_TAG, e))),
        None => Ok(ChangeLog::from_parts(Vec::new(), applied)),
    }
}
