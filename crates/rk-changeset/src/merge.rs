// merge.rs — Fold accepted proposals into final document text.
//
// The merge is a pure function of (existing text, proposals in acceptance
// order). Two regimes:
//
// - New document: every new-document edit is concatenated in acceptance
//   order; metadata comes from the most recently accepted one.
// - Existing document: proposals are walked newest first. The first proposal
//   seen that sets a metadata field wins that field. Body edits are layered
//   in the same walk: replacements substitute every occurrence of their span,
//   additions insert after their anchor or append when the anchor is missing.
//
// When the resulting metadata equals the original, the original header bytes
// are kept verbatim so the rendered diff only shows real changes.

use crate::anchor::{self, AnchorPosition};
use crate::document::{DocumentMetadata, Framing};
use crate::error::ChangeSetError;
use crate::proposal::{EditInstruction, EditKind, Proposal};

/// The result of merging one path's proposals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Path of the merged document.
    pub path: String,
    /// Final document text.
    pub text: String,
    /// True when the text is a newly created document.
    pub created: bool,
    /// True when the metadata block differs from the original.
    pub metadata_changed: bool,
    /// Additions whose anchor was not found and were appended instead.
    pub anchors_missed: usize,
    /// Replacements whose span was absent (no-op).
    pub spans_missed: usize,
}

/// Merge `proposals` (all targeting `path`, in acceptance order) into the
/// existing document text, if any.
pub fn merge_proposals(
    path: &str,
    existing: Option<&str>,
    proposals: &[&Proposal],
) -> Result<MergeReport, ChangeSetError> {
    if let Some(stray) = proposals.iter().find(|p| p.target_path != path) {
        return Err(ChangeSetError::MixedTargets {
            expected: path.to_string(),
            found: stray.target_path.clone(),
        });
    }

    if proposals.is_empty() {
        return Ok(MergeReport {
            path: path.to_string(),
            text: existing.unwrap_or_default().to_string(),
            created: false,
            metadata_changed: false,
            anchors_missed: 0,
            spans_missed: 0,
        });
    }

    if proposals.iter().any(|p| p.creates_document()) {
        if existing.is_some() {
            return Err(ChangeSetError::NewDocumentConflict {
                path: path.to_string(),
            });
        }
        return merge_new_document(path, proposals);
    }

    Ok(merge_existing(path, existing.unwrap_or_default(), proposals))
}

fn merge_new_document(path: &str, proposals: &[&Proposal]) -> Result<MergeReport, ChangeSetError> {
    if proposals
        .iter()
        .flat_map(|p| p.edits.iter())
        .any(|e| !e.targets_new_document)
    {
        return Err(ChangeSetError::DuplicateNewFile {
            path: path.to_string(),
            detail: "new-document edits cannot be combined with in-place edits".to_string(),
        });
    }

    let edits: Vec<&EditInstruction> = proposals.iter().flat_map(|p| p.edits.iter()).collect();
    let Some(latest) = edits.last() else {
        return Err(ChangeSetError::DuplicateNewFile {
            path: path.to_string(),
            detail: "no new-document edits to merge".to_string(),
        });
    };

    let metadata = DocumentMetadata {
        description: latest.description_override().map(str::to_string),
        globs: latest.globs_override().map(<[String]>::to_vec).unwrap_or_default(),
        extra: Vec::new(),
    };

    let mut text = metadata.to_block();
    let body = edits
        .iter()
        .map(|e| e.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    text.push_str(&body);
    if !text.ends_with('\n') {
        text.push('\n');
    }

    tracing::debug!(path, edits = edits.len(), "merged new document");
    Ok(MergeReport {
        path: path.to_string(),
        text,
        created: true,
        metadata_changed: true,
        anchors_missed: 0,
        spans_missed: 0,
    })
}

fn merge_existing(path: &str, existing: &str, proposals: &[&Proposal]) -> MergeReport {
    let framing = Framing::split(existing);
    let original = DocumentMetadata::parse_block(framing.metadata_block);

    let mut body = framing.body.to_string();
    let mut description: Option<&str> = None;
    let mut globs: Option<&[String]> = None;
    let mut anchors_missed = 0;
    let mut spans_missed = 0;

    for proposal in proposals.iter().rev() {
        for edit in &proposal.edits {
            if description.is_none() {
                description = edit.description_override();
            }
            if globs.is_none() {
                globs = edit.globs_override();
            }

            match edit.kind {
                EditKind::Replacement => {
                    let span = edit.exact_span.as_deref().unwrap_or_default();
                    if !span.is_empty() && body.contains(span) {
                        body = body.replace(span, &edit.content);
                    } else {
                        spans_missed += 1;
                        tracing::warn!(path, span = %span, "replacement span not found, skipping");
                    }
                }
                EditKind::Addition => {
                    if edit.content.is_empty() {
                        continue;
                    }
                    let anchor = edit.anchor_context.as_deref().unwrap_or_default();
                    if anchor.trim().is_empty() {
                        append(&mut body, &edit.content);
                        continue;
                    }
                    match anchor::resolve(&body, anchor) {
                        AnchorPosition::After { byte_offset, .. } => {
                            body.insert_str(byte_offset, &format!("\n{}", edit.content));
                        }
                        AnchorPosition::Fallback => {
                            anchors_missed += 1;
                            tracing::warn!(
                                path,
                                anchor = %anchor.trim(),
                                "anchor not found, appending to end of document"
                            );
                            append(&mut body, &edit.content);
                        }
                    }
                }
            }
        }
    }

    let mut metadata = original.clone();
    if let Some(d) = description {
        metadata.description = Some(d.to_string());
    }
    if let Some(g) = globs {
        metadata.globs = g.to_vec();
    }
    let metadata_changed = metadata != original;

    let mut text = if metadata_changed {
        metadata.to_block()
    } else {
        framing.header.to_string()
    };
    text.push_str(&body);

    MergeReport {
        path: path.to_string(),
        text,
        created: false,
        metadata_changed,
        anchors_missed,
        spans_missed,
    }
}

fn append(body: &mut String, content: &str) {
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }
    body.push_str(content);
}

/// Group proposals by target path, keeping first-appearance order of paths
/// and acceptance order within each group.
pub fn group_by_path<'a, I>(proposals: I) -> Vec<(String, Vec<&'a Proposal>)>
where
    I: IntoIterator<Item = &'a Proposal>,
{
    let mut groups: Vec<(String, Vec<&'a Proposal>)> = Vec::new();
    for proposal in proposals {
        match groups.iter_mut().find(|(path, _)| *path == proposal.target_path) {
            Some((_, group)) => group.push(proposal),
            None => groups.push((proposal.target_path.clone(), vec![proposal])),
        }
    }
    groups
}
