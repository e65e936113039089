//! Proposal generation contract
//!
//! Turning a comment into a proposal is a black box (a hosted model in
//! production). This module fixes its inputs and outputs and builds the two
//! textual contexts it receives: the code around a review comment and the
//! current rule documents.

use std::collections::VecDeque;
use std::sync::Mutex;

use rk_changeset::{DocumentSnapshot, Proposal};

use crate::adapter::{Comment, CommentKind, Result};

/// Lines of file content shown on each side of the commented line.
pub const CODE_WINDOW_LINES: usize = 20;

/// Rules context when the repository has no rule documents.
pub const NO_RULES_CONTEXT: &str = "No existing rule documents found in the repository.";

/// What the generator decided for one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Proposal(Proposal),
    NoProposal { reason: String },
}

/// Produces a proposal (or declines) from a comment and its context.
pub trait ProposalGenerator: Send + Sync {
    fn generate(
        &self,
        comment: &str,
        code_context: Option<&str>,
        rules_context: &str,
    ) -> Result<GenerationOutcome>;
}

/// One recorded call to a [`ScriptedGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationCall {
    pub comment: String,
    pub code_context: Option<String>,
    pub rules_context: String,
}

/// Replays a fixed queue of outcomes; declines once the queue is empty.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    outcomes: Mutex<VecDeque<GenerationOutcome>>,
    calls: Mutex<Vec<GenerationCall>>,
}

impl ScriptedGenerator {
    pub fn new(outcomes: impl IntoIterator<Item = GenerationOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, outcome: GenerationOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(outcome);
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl ProposalGenerator for ScriptedGenerator {
    fn generate(
        &self,
        comment: &str,
        code_context: Option<&str>,
        rules_context: &str,
    ) -> Result<GenerationOutcome> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(GenerationCall {
                comment: comment.to_string(),
                code_context: code_context.map(str::to_string),
                rules_context: rules_context.to_string(),
            });
        let next = self
            .outcomes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        Ok(next.unwrap_or_else(|| GenerationOutcome::NoProposal {
            reason: "no scripted outcome left".to_string(),
        }))
    }
}

/// Render every rule document for the generator.
pub fn rules_context(documents: &DocumentSnapshot, extension: &str) -> String {
    if documents.is_empty() {
        return NO_RULES_CONTEXT.to_string();
    }
    let mut out = String::from("Current rule documents in repository:\n\n");
    for (path, content) in documents {
        out.push_str(&format!("Rule: {}\n```{}\n{}\n```\n\n", path, extension, content));
    }
    out
}

/// Code context for a review comment.
///
/// `file` is the commented file at the request head; when it could not be
/// read the context is the diff hunk alone. Issue comments have no context.
pub fn code_context(comment: &Comment, file: Option<&str>) -> Option<String> {
    if comment.kind != CommentKind::Review {
        return None;
    }
    let path = comment.path.as_deref()?;
    let line = comment.line.unwrap_or(0) as usize;
    let hunk = comment.diff_hunk.as_deref().unwrap_or_default();

    let mut out = format!("File: {}\nLine: {}\n\n", path, line);
    match file {
        Some(content) => {
            let lines: Vec<&str> = content.split('\n').collect();
            let start = line.saturating_sub(CODE_WINDOW_LINES).min(lines.len());
            let end = (line + CODE_WINDOW_LINES).min(lines.len());
            out.push_str(&format!("Diff hunk:\n```\n{}\n```\n\n", hunk));
            out.push_str(&format!(
                "Broader file context:\n```\n{}\n```",
                lines[start..end].join("\n")
            ));
        }
        None => out.push_str(&format!("```\n{}\n```", hunk)),
    }
    Some(out)
}
