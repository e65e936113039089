//! Collaborator traits and the types that cross them
//!
//! The lifecycle engine talks to the outside world through three narrow
//! traits: reading rule documents, reading and writing discussion comments,
//! and writing commits. "Document absent" is `Ok(None)`, never an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while talking to a repository host
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Adapter not configured: {0}")]
    NotConfigured(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("VCS operation failed: {0}")]
    VcsError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Comment {id} changed concurrently (expected revision {expected}, found {actual})")]
    RevisionConflict { id: u64, expected: u64, actual: u64 },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SubmitError {
    /// Only rate limits and transient failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubmitError::RateLimited { .. } | SubmitError::Transient(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SubmitError>;

/// Platform id of a comment.
pub type CommentId = u64;

/// One review request (pull request) in one repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// `owner/name`
    pub repository: String,
    pub number: u64,
    /// Head ref the code context is read from.
    #[serde(default)]
    pub head_ref: String,
}

impl ReviewRequest {
    pub fn new(repository: impl Into<String>, number: u64) -> Self {
        Self {
            repository: repository.into(),
            number,
            head_ref: String::new(),
        }
    }

    pub fn with_head_ref(mut self, head_ref: impl Into<String>) -> Self {
        self.head_ref = head_ref.into();
        self
    }

    /// Stable key used for caches and state: `owner/name#number`.
    pub fn key(&self) -> String {
        format!("{}#{}", self.repository, self.number)
    }
}

/// Conversation-level comment or inline review comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Issue,
    Review,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
    #[serde(default)]
    pub is_bot: bool,
}

impl Author {
    pub fn human(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            is_bot: false,
        }
    }

    pub fn bot(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            is_bot: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub kind: CommentKind,
    pub body: String,
    pub author: Author,

    /// Review comments only: the comment this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<CommentId>,

    /// Review comments only: file the comment is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Review comments only: line in `path` the comment is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Review comments only: the diff hunk shown around the comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_hunk: Option<String>,

    /// Bumped on every edit. Used for compare-and-swap edits.
    #[serde(default)]
    pub revision: u64,

    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Identity of the discussion thread: replies resolve to their root.
    pub fn thread_root(&self) -> CommentId {
        self.in_reply_to.unwrap_or(self.id)
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to.is_some()
    }
}

/// One file to write in a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWrite {
    pub path: String,
    pub content: String,
}

/// Result of a commit operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResult {
    /// Commit identifier (hash or adapter-specific id)
    pub commit_id: String,

    /// Human-readable message
    pub message: String,

    /// Adapter-specific metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Read access to rule documents (and any other file) at the request head.
pub trait DocumentSource {
    /// Current content of `path`, or `None` when the file does not exist.
    fn fetch_document(&self, request: &ReviewRequest, path: &str) -> Result<Option<String>>;

    /// Paths of every file under `directory`, sorted.
    fn list_documents(&self, request: &ReviewRequest, directory: &str) -> Result<Vec<String>>;
}

/// Discussion threads on a review request.
pub trait ThreadSource {
    /// Every comment on the request, issue and review, in creation order.
    fn fetch_comments(&self, request: &ReviewRequest) -> Result<Vec<Comment>>;

    /// Reply in the review thread rooted at `thread_root`.
    fn post_reply(&self, request: &ReviewRequest, thread_root: CommentId, body: &str) -> Result<Comment>;

    /// Post a conversation-level comment.
    fn post_comment(&self, request: &ReviewRequest, body: &str) -> Result<Comment>;

    /// Replace a comment body if it is still at `expected_revision`.
    ///
    /// Fails with [`SubmitError::RevisionConflict`] when someone else edited
    /// the comment first.
    fn edit_comment(
        &self,
        request: &ReviewRequest,
        id: CommentId,
        expected_revision: u64,
        body: &str,
    ) -> Result<Comment>;
}

/// Writes files to the request head as one commit.
pub trait CommitWriter {
    fn write_commit(
        &self,
        request: &ReviewRequest,
        files: &[FileWrite],
        message: &str,
    ) -> Result<CommitResult>;
}

/// Everything the lifecycle engine needs from a repository host.
pub trait RepositoryAdapter: DocumentSource + ThreadSource + CommitWriter + Send + Sync {
    /// Adapter display name (for CLI output and logs)
    fn name(&self) -> &str;

    /// Login the adapter posts as.
    fn bot_login(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limit_and_transient_are_retryable() {
        assert!(SubmitError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(SubmitError::Transient("502".into()).is_retryable());
        assert!(!SubmitError::Validation("bad".into()).is_retryable());
        assert!(!SubmitError::RevisionConflict {
            id: 1,
            expected: 1,
            actual: 2
        }
        .is_retryable());
        assert!(!SubmitError::VcsError("boom".into()).is_retryable());
    }

    #[test]
    fn replies_resolve_to_thread_root() {
        let json = r#"{"id":9,"kind":"review","body":"+1","author":{"login":"dev"},"in_reply_to":4}"#;
        let comment: Comment = serde_json::from_str(json).unwrap();
        assert!(comment.is_reply());
        assert_eq!(comment.thread_root(), 4);
        assert_eq!(comment.revision, 0);
        assert!(!comment.author.is_bot);
    }

    #[test]
    fn request_key_is_stable() {
        let request = ReviewRequest::new("acme/widgets", 17).with_head_ref("feature");
        assert_eq!(request.key(), "acme/widgets#17");
    }
}
