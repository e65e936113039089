// proposal.rs — Proposals and the edit instructions they carry.
//
// A Proposal is one candidate change to one rule document, produced from a
// discussion comment. It carries edit instructions that are anchored in the
// existing text rather than positioned by line number, because the document
// may change between the time a proposal is made and the time it is applied.
//
// Construction rules are enforced by `validate()`; nothing that fails it is
// ever handed to the merge engine.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ChangeSetError;

/// Maximum number of lines an addition anchor may span.
pub const MAX_ANCHOR_LINES: usize = 2;

/// Identity of an accepted proposal within a change log (the platform id of
/// the suggestion comment that carried it).
pub type ProposalId = u64;

/// What an edit instruction does to the target body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    /// Insert `content` after an anchor (or at the end).
    Addition,
    /// Substitute `content` for every occurrence of `exact_span`.
    Replacement,
}

/// A single anchor-based edit to a rule document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditInstruction {
    pub kind: EditKind,

    /// Text to insert, or the replacement text.
    pub content: String,

    /// For replacements: the literal text being replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact_span: Option<String>,

    /// For additions: up to two lines immediately preceding the insertion point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_context: Option<String>,

    /// Whether this edit creates a brand new document.
    #[serde(default)]
    pub targets_new_document: bool,

    /// New glob patterns. Required for new documents, optional override otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globs: Option<Vec<String>>,

    /// New description. Required for new documents, optional override otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EditInstruction {
    /// An addition, optionally anchored after `anchor_context`.
    pub fn addition(content: impl Into<String>, anchor_context: Option<&str>) -> Self {
        Self {
            kind: EditKind::Addition,
            content: content.into(),
            exact_span: None,
            anchor_context: anchor_context.map(str::to_string),
            targets_new_document: false,
            globs: None,
            description: None,
        }
    }

    /// A replacement of `exact_span` by `content`.
    pub fn replacement(exact_span: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Replacement,
            content: content.into(),
            exact_span: Some(exact_span.into()),
            anchor_context: None,
            targets_new_document: false,
            globs: None,
            description: None,
        }
    }

    /// The body of a new document with its required metadata.
    pub fn new_document(
        content: impl Into<String>,
        description: impl Into<String>,
        globs: Vec<String>,
    ) -> Self {
        Self {
            kind: EditKind::Addition,
            content: content.into(),
            exact_span: None,
            anchor_context: None,
            targets_new_document: true,
            globs: Some(globs),
            description: Some(description.into()),
        }
    }

    /// Override the document description (builder pattern).
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Override the document globs (builder pattern).
    pub fn with_globs(mut self, globs: Vec<String>) -> Self {
        self.globs = Some(globs);
        self
    }

    /// The description override, ignoring empty strings.
    pub fn description_override(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.trim().is_empty())
    }

    /// The glob override, ignoring empty lists.
    pub fn globs_override(&self) -> Option<&[String]> {
        self.globs.as_deref().filter(|g| !g.is_empty())
    }

    /// Check the construction rules for a single edit.
    pub fn validate(&self) -> Result<(), ChangeSetError> {
        if self.targets_new_document {
            if self.description_override().is_none() || self.globs_override().is_none() {
                return Err(ChangeSetError::MalformedProposal(
                    "new documents must specify both globs and description".to_string(),
                ));
            }
            if self.anchor_context.is_some() || self.exact_span.is_some() {
                return Err(ChangeSetError::MalformedProposal(
                    "anchor_context and exact_span cannot be used with new documents".to_string(),
                ));
            }
        }

        match self.kind {
            EditKind::Replacement => {
                if self.exact_span.as_deref().unwrap_or("").is_empty() {
                    return Err(ChangeSetError::MalformedProposal(
                        "exact_span is required for replacements".to_string(),
                    ));
                }
            }
            EditKind::Addition => {
                if let Some(anchor) = &self.anchor_context {
                    let lines = anchor.trim_matches('\n').lines().count();
                    if lines > MAX_ANCHOR_LINES {
                        return Err(ChangeSetError::MalformedProposal(format!(
                            "anchor_context spans {} lines, at most {} allowed",
                            lines, MAX_ANCHOR_LINES
                        )));
                    }
                }
            }
        }

        // Metadata is written one field per header line.
        if let Some(description) = &self.description {
            if description.contains(['\n', '\r']) {
                return Err(ChangeSetError::MalformedProposal(
                    "description must be a single line".to_string(),
                ));
            }
        }

        if let Some(globs) = &self.globs {
            for pattern in globs {
                if pattern.contains(['\n', '\r', '"']) {
                    return Err(ChangeSetError::MalformedProposal(format!(
                        "glob pattern {:?} must be a single unquoted line",
                        pattern
                    )));
                }
                glob::Pattern::new(pattern).map_err(|e| {
                    ChangeSetError::MalformedProposal(format!(
                        "invalid glob pattern '{}': {}",
                        pattern, e
                    ))
                })?;
            }
        }

        Ok(())
    }
}

/// Whether a proposal creates a document or updates an existing one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProposalOperation {
    Create,
    Update,
}

impl std::fmt::Display for ProposalOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProposalOperation::Create => write!(f, "create"),
            ProposalOperation::Update => write!(f, "update"),
        }
    }
}

/// One candidate change to a rule document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proposal {
    /// Path of the rule document this proposal changes.
    pub target_path: String,

    pub operation: ProposalOperation,

    /// Edits in application order. One per proposal in practice.
    pub edits: Vec<EditInstruction>,

    /// Why the change was proposed (one sentence).
    #[serde(default)]
    pub rationale: String,
}

impl Proposal {
    /// Build a proposal, rejecting it if it violates any construction rule.
    pub fn new(
        target_path: impl Into<String>,
        operation: ProposalOperation,
        edits: Vec<EditInstruction>,
        rationale: impl Into<String>,
    ) -> Result<Self, ChangeSetError> {
        let proposal = Self {
            target_path: target_path.into(),
            operation,
            edits,
            rationale: rationale.into(),
        };
        proposal.validate()?;
        Ok(proposal)
    }

    /// Check the proposal and every edit it carries.
    pub fn validate(&self) -> Result<(), ChangeSetError> {
        if self.target_path.trim().is_empty() {
            return Err(ChangeSetError::MalformedProposal(
                "target_path is required".to_string(),
            ));
        }
        if self.edits.is_empty() {
            return Err(ChangeSetError::MalformedProposal(
                "a proposal must carry at least one edit".to_string(),
            ));
        }
        for edit in &self.edits {
            edit.validate()?;
        }
        Ok(())
    }

    /// True when any edit creates a new document.
    pub fn creates_document(&self) -> bool {
        self.edits.iter().any(|e| e.targets_new_document)
    }

    /// SHA-256 of the canonical JSON encoding, hex encoded.
    pub fn content_hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
