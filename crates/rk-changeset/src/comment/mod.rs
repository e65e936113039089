// comment/mod.rs — Rendered comments and the hidden markers they carry.
//
// Every comment the bot posts starts with a visible signature line so bot
// output can be recognised (and never fed back into proposal generation).
// Machine-readable state rides along in HTML comments, which the host
// platform does not display:
//
//   <!--thread-root-123-->            which discussion thread a suggestion covers
//   <!--rule-proposal\n{json}\n-->    the full proposal behind a suggestion
//   <!--rule-changes\n{json}\n-->     the change log behind the summary

pub mod suggestion;
pub mod summary;

use regex::Regex;

use crate::error::ChangeSetError;
use crate::proposal::Proposal;

/// First line of the long-lived summary comment.
pub const SUMMARY_SIGNATURE: &str = "### 💡 RULE SUGGESTIONS SUMMARY";

/// First line of every suggestion comment.
pub const SUGGESTION_SIGNATURE: &str = "**💡 RULE SUGGESTION**";

/// Banner added to the summary once its change log is applied.
pub const APPLIED_SIGNATURE: &str = "✅ RULES APPLIED";

/// Text of the acceptance checkbox on a suggestion.
pub const ACCEPT_PROMPT: &str = "Accept this suggestion?";

/// Hidden block tag carrying a suggestion's proposal.
pub const PROPOSAL_TAG: &str = "rule-proposal";

/// Hidden block tag carrying the summary's change log.
pub const CHANGES_TAG: &str = "rule-changes";

/// True when `body` was written by this bot.
pub fn has_bot_signature(body: &str) -> bool {
    [SUMMARY_SIGNATURE, SUGGESTION_SIGNATURE, APPLIED_SIGNATURE]
        .iter()
        .any(|sig| body.contains(sig))
}

/// True when the acceptance checkbox in `body` is ticked.
///
/// Only the rendered checkbox line counts. Checklists quoted in a diff
/// preview or in a hidden proposal block never do.
pub fn is_checked(body: &str) -> bool {
    visible_lines(body).any(|line| {
        let line = line.trim();
        let item = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .unwrap_or(line);
        matches!(
            item.strip_prefix("[x]").or_else(|| item.strip_prefix("[X]")),
            Some(rest) if rest.trim() == ACCEPT_PROMPT
        )
    })
}

/// Lines of `body` that the host displays as prose: hidden `<!-- -->` blocks
/// and fenced code blocks are skipped.
pub fn visible_lines(body: &str) -> impl Iterator<Item = &str> {
    let mut hidden = false;
    let mut fenced = false;
    body.lines().filter(move |line| {
        let trimmed = line.trim();
        if hidden {
            if trimmed == "-->" {
                hidden = false;
            }
            return false;
        }
        if fenced {
            if trimmed.starts_with("```") {
                fenced = false;
            }
            return false;
        }
        if trimmed.starts_with("<!--") {
            hidden = !trimmed.ends_with("-->");
            return false;
        }
        if trimmed.starts_with("```") {
            fenced = true;
            return false;
        }
        true
    })
}

/// Hidden marker naming the thread a suggestion belongs to.
pub fn thread_marker(thread_root: u64) -> String {
    format!("<!--thread-root-{}-->", thread_root)
}

/// Read the thread root id out of a suggestion body.
pub fn extract_thread_root(body: &str) -> Option<u64> {
    let re = Regex::new(r"<!--thread-root-(\d+)-->").ok()?;
    re.captures(body)?.get(1)?.as_str().parse().ok()
}

/// Wrap a JSON payload in a hidden block.
pub fn hidden_block(tag: &str, json: &str) -> String {
    format!("<!--{}\n{}\n-->", tag, json)
}

/// The JSON text inside the hidden block named `tag`, if present.
pub fn extract_hidden_block<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let opening = format!("<!--{}\n", tag);
    let start = body.find(&opening)? + opening.len();
    let end = body[start..].find("\n-->")? + start;
    Some(&body[start..end])
}

/// Decode the proposal carried by a suggestion comment.
///
/// `Ok(None)` when the body has no proposal block at all; an error when the
/// block is present but does not decode to a valid proposal.
pub fn extract_proposal(body: &str) -> Result<Option<Proposal>, ChangeSetError> {
    let Some(json) = extract_hidden_block(body, PROPOSAL_TAG) else {
        return Ok(None);
    };
    let proposal: Proposal = serde_json::from_str(json)
        .map_err(|e| ChangeSetError::InvalidMarker(format!("{}: {}", PROPOSAL_TAG, e)))?;
    proposal.validate()?;
    Ok(Some(proposal))
}
