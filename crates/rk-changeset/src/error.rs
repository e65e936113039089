// error.rs — Error types for the rule changeset subsystem.
//
// Merge and diff are pure computations, so the only failures here are
// validation failures and explicit conflicts. Anchor misses are not errors:
// the merge engine falls back to appending and logs the miss.

use thiserror::Error;

/// Errors that can occur while building, merging, or rendering rule changes.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    /// A proposal or edit instruction violates its construction rules
    /// (missing new-document fields, a replacement without its span, ...).
    #[error("malformed proposal: {0}")]
    MalformedProposal(String),

    /// Several new-document proposals for one path cannot be combined by
    /// simple concatenation.
    #[error("conflicting new-document proposals for {path}: {detail}")]
    DuplicateNewFile { path: String, detail: String },

    /// A new-document proposal targets a path that already has content.
    #[error("cannot create {path}: a document already exists at that path")]
    NewDocumentConflict { path: String },

    /// A merge group contained proposals for more than one path.
    #[error("merge group for {expected} contains a proposal for {found}")]
    MixedTargets { expected: String, found: String },

    /// The rendered summary would exceed the platform comment ceiling.
    #[error("rendered summary is {size} bytes, exceeding the {ceiling} byte ceiling")]
    SizeExceeded { size: usize, ceiling: usize },

    /// A hidden marker in a rendered comment could not be decoded.
    #[error("invalid marker: {0}")]
    InvalidMarker(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
