// error.rs — Error types for the suggestion lifecycle subsystem.
//
// Outcomes that are part of normal operation (duplicate suggestion, already
// applied, size ceiling reached) are not errors; they are `HandleOutcome`
// variants. Errors here mean the request could not be handled.

use rk_changeset::ChangeSetError;
use rk_submit::SubmitError;
use thiserror::Error;

/// Errors that can occur while handling a comment event.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Merge, rendering or marker decoding failed.
    #[error(transparent)]
    ChangeSet(#[from] ChangeSetError),

    /// A collaborator call failed.
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// Reading or writing persisted server state failed.
    #[error("storage error at {location}: {source}")]
    StorageError {
        location: String,
        source: std::io::Error,
    },

    /// Failed to serialize server state.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A suggestion record was asked to make a transition its state forbids.
    #[error("invalid transition from {from} to {to} for suggestion {record_id}")]
    InvalidTransition {
        record_id: String,
        from: String,
        to: String,
    },

    /// The commit collaborator failed; no lifecycle state was changed and
    /// the apply can be retried.
    #[error("commit failed for {request}: {source}")]
    CommitFailure {
        request: String,
        #[source]
        source: SubmitError,
    },

    /// The state storage URL names a backend that does not exist.
    #[error("unsupported storage backend: {0}")]
    UnsupportedStorage(String),
}
