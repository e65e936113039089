// suggestion.rs — The per-thread suggestion comment.
//
// A suggestion shows the reader what accepting would change, and carries the
// whole proposal in a hidden block so acceptance never has to regenerate it.

use super::{hidden_block, thread_marker, ACCEPT_PROMPT, PROPOSAL_TAG, SUGGESTION_SIGNATURE};
use crate::diff::DocumentDiff;
use crate::document::format_globs;
use crate::error::ChangeSetError;
use crate::merge;
use crate::proposal::Proposal;

/// Lines of unchanged context shown around each change in a preview.
pub const PREVIEW_CONTEXT: usize = 3;

/// Render the suggestion comment for `proposal`.
///
/// `existing` is the current text of the target document, if it exists.
pub fn render_suggestion(
    proposal: &Proposal,
    thread_root: u64,
    existing: Option<&str>,
) -> Result<String, ChangeSetError> {
    let json = serde_json::to_string(proposal)?;
    let mut lines = vec![
        SUGGESTION_SIGNATURE.to_string(),
        thread_marker(thread_root),
        String::new(),
    ];

    if proposal.creates_document() {
        lines.push(format!(
            "I suggest creating a new rule document `{}` as follows:",
            proposal.target_path
        ));
    } else {
        lines.push(format!("I suggest updating `{}` as follows:", proposal.target_path));
    }
    lines.push(String::new());
    lines.push(hidden_block(PROPOSAL_TAG, &json));
    lines.push(String::new());

    if !proposal.rationale.trim().is_empty() {
        lines.push(format!("_{}_", proposal.rationale.trim()));
        lines.push(String::new());
    }

    if proposal.creates_document() {
        render_new_document_preview(proposal, &mut lines);
    } else {
        let merged = merge::merge_proposals(&proposal.target_path, existing, &[proposal])?;
        let diff = DocumentDiff::between(existing.unwrap_or_default(), &merged.text);
        lines.push("**Changes:**".to_string());
        lines.push("```diff".to_string());
        lines.extend(diff.render(Some(PREVIEW_CONTEXT)));
        lines.push("```".to_string());
        lines.push(String::new());
    }

    lines.push(
        "Check the box below to add this suggestion to the summary of suggested changes. \
         **Clicking will NOT commit anything.**"
            .to_string(),
    );
    lines.push(format!("- [ ] {}", ACCEPT_PROMPT));
    Ok(lines.join("\n"))
}

fn render_new_document_preview(proposal: &Proposal, lines: &mut Vec<String>) {
    for edit in proposal.edits.iter().filter(|e| e.targets_new_document) {
        lines.push("**Description:**".to_string());
        lines.push("```".to_string());
        lines.push(edit.description_override().unwrap_or_default().to_string());
        lines.push("```".to_string());
        lines.push(String::new());
        lines.push("**Globs:**".to_string());
        lines.push("```".to_string());
        lines.push(format_globs(edit.globs_override().unwrap_or_default()));
        lines.push("```".to_string());
        lines.push(String::new());
        lines.push("**Content:**".to_string());
        lines.push("```diff".to_string());
        lines.extend(edit.content.split('\n').map(|l| format!("+{}", l)));
        lines.push("```".to_string());
        lines.push(String::new());
    }
}
