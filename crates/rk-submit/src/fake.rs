//! Deterministic in-memory repository host
//!
//! Comment ids are sequential, revisions bump on every edit, and there is no
//! clock beyond a fixed epoch. Failures are injected explicitly: queued
//! commit errors, and edits made "by someone else" right before the next
//! compare-and-swap edit.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::adapter::{
    Author, Comment, CommentId, CommentKind, CommitResult, CommitWriter, DocumentSource, FileWrite,
    RepositoryAdapter, Result, ReviewRequest, SubmitError, ThreadSource,
};

/// A commit accepted by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub request: ReviewRequest,
    pub files: Vec<FileWrite>,
    pub message: String,
}

#[derive(Debug, Default)]
struct FakeState {
    documents: BTreeMap<String, String>,
    threads: HashMap<String, Vec<Comment>>,
    next_id: CommentId,
    commits: Vec<RecordedCommit>,
    commit_failures: VecDeque<SubmitError>,
    interference: VecDeque<(CommentId, String)>,
    comment_fetches: usize,
}

impl FakeState {
    fn allocate_id(&mut self) -> CommentId {
        self.next_id += 1;
        self.next_id
    }

    fn find_mut(&mut self, request: &ReviewRequest, id: CommentId) -> Result<&mut Comment> {
        self.threads
            .get_mut(&request.key())
            .and_then(|t| t.iter_mut().find(|c| c.id == id))
            .ok_or_else(|| SubmitError::NotFound(format!("comment {} on {}", id, request.key())))
    }
}

/// In-memory [`RepositoryAdapter`] for tests and dry runs.
#[derive(Debug)]
pub struct FakeRepository {
    bot_login: String,
    state: Mutex<FakeState>,
}

impl Default for FakeRepository {
    fn default() -> Self {
        Self::new("rulekeeper[bot]")
    }
}

impl FakeRepository {
    pub fn new(bot_login: impl Into<String>) -> Self {
        Self {
            bot_login: bot_login.into(),
            state: Mutex::new(FakeState {
                next_id: 1000,
                ..FakeState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Seed a document (builder pattern).
    pub fn with_document(self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.set_document(path, text);
        self
    }

    pub fn set_document(&self, path: impl Into<String>, text: impl Into<String>) {
        self.state().documents.insert(path.into(), text.into());
    }

    pub fn document(&self, path: &str) -> Option<String> {
        self.state().documents.get(path).cloned()
    }

    fn insert_comment(&self, request: &ReviewRequest, mut comment: Comment) -> Comment {
        let mut state = self.state();
        comment.id = state.allocate_id();
        state
            .threads
            .entry(request.key())
            .or_default()
            .push(comment.clone());
        comment
    }

    /// A conversation-level comment from a human.
    pub fn add_issue_comment(&self, request: &ReviewRequest, login: &str, body: &str) -> Comment {
        self.insert_comment(request, new_comment(CommentKind::Issue, Author::human(login), body))
    }

    /// An inline review comment from a human, starting a new thread.
    pub fn add_review_comment(
        &self,
        request: &ReviewRequest,
        login: &str,
        body: &str,
        path: &str,
        line: u32,
        diff_hunk: &str,
    ) -> Comment {
        let mut comment = new_comment(CommentKind::Review, Author::human(login), body);
        comment.path = Some(path.to_string());
        comment.line = Some(line);
        comment.diff_hunk = Some(diff_hunk.to_string());
        self.insert_comment(request, comment)
    }

    /// A human reply inside an existing review thread.
    pub fn add_review_reply(
        &self,
        request: &ReviewRequest,
        login: &str,
        thread_root: CommentId,
        body: &str,
    ) -> Comment {
        let mut comment = new_comment(CommentKind::Review, Author::human(login), body);
        comment.in_reply_to = Some(thread_root);
        self.insert_comment(request, comment)
    }

    /// Change a comment body as a user would (ticking a checkbox, say).
    pub fn user_edit(&self, request: &ReviewRequest, id: CommentId, body: &str) -> Result<Comment> {
        let mut state = self.state();
        let comment = state.find_mut(request, id)?;
        comment.body = body.to_string();
        comment.revision += 1;
        Ok(comment.clone())
    }

    /// Fail the next commits with these errors, in order.
    pub fn fail_next_commits(&self, errors: impl IntoIterator<Item = SubmitError>) {
        self.state().commit_failures.extend(errors);
    }

    /// Right before the next `edit_comment`, another writer replaces comment
    /// `id` with `body`, so a compare-and-swap against the old revision fails.
    pub fn interfere_before_next_edit(&self, id: CommentId, body: impl Into<String>) {
        self.state().interference.push_back((id, body.into()));
    }

    pub fn comments(&self, request: &ReviewRequest) -> Vec<Comment> {
        self.state()
            .threads
            .get(&request.key())
            .cloned()
            .unwrap_or_default()
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.state().commits.clone()
    }

    /// Number of `fetch_comments` calls served.
    pub fn comment_fetches(&self) -> usize {
        self.state().comment_fetches
    }

    fn post(&self, request: &ReviewRequest, mut comment: Comment) -> Comment {
        comment.author = Author::bot(self.bot_login.clone());
        self.insert_comment(request, comment)
    }
}

fn new_comment(kind: CommentKind, author: Author, body: &str) -> Comment {
    Comment {
        id: 0,
        kind,
        body: body.to_string(),
        author,
        in_reply_to: None,
        path: None,
        line: None,
        diff_hunk: None,
        revision: 0,
        created_at: Default::default(),
    }
}

impl DocumentSource for FakeRepository {
    fn fetch_document(&self, _request: &ReviewRequest, path: &str) -> Result<Option<String>> {
        Ok(self.state().documents.get(path).cloned())
    }

    fn list_documents(&self, _request: &ReviewRequest, directory: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", directory.trim_end_matches('/'));
        Ok(self
            .state()
            .documents
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect())
    }
}

impl ThreadSource for FakeRepository {
    fn fetch_comments(&self, request: &ReviewRequest) -> Result<Vec<Comment>> {
        let mut state = self.state();
        state.comment_fetches += 1;
        Ok(state.threads.get(&request.key()).cloned().unwrap_or_default())
    }

    fn post_reply(&self, request: &ReviewRequest, thread_root: CommentId, body: &str) -> Result<Comment> {
        let mut comment = new_comment(CommentKind::Review, Author::bot(""), body);
        comment.in_reply_to = Some(thread_root);
        Ok(self.post(request, comment))
    }

    fn post_comment(&self, request: &ReviewRequest, body: &str) -> Result<Comment> {
        Ok(self.post(request, new_comment(CommentKind::Issue, Author::bot(""), body)))
    }

    fn edit_comment(
        &self,
        request: &ReviewRequest,
        id: CommentId,
        expected_revision: u64,
        body: &str,
    ) -> Result<Comment> {
        let mut state = self.state();
        if let Some((target, other_body)) = state.interference.pop_front() {
            let other = state.find_mut(request, target)?;
            other.body = other_body;
            other.revision += 1;
        }
        let comment = state.find_mut(request, id)?;
        if comment.revision != expected_revision {
            return Err(SubmitError::RevisionConflict {
                id,
                expected: expected_revision,
                actual: comment.revision,
            });
        }
        comment.body = body.to_string();
        comment.revision += 1;
        Ok(comment.clone())
    }
}

impl CommitWriter for FakeRepository {
    fn write_commit(&self, request: &ReviewRequest, files: &[FileWrite], message: &str) -> Result<CommitResult> {
        let mut state = self.state();
        if let Some(error) = state.commit_failures.pop_front() {
            tracing::debug!(error = %error, "FakeRepository: injected commit failure");
            return Err(error);
        }
        for file in files {
            state.documents.insert(file.path.clone(), file.content.clone());
        }
        state.commits.push(RecordedCommit {
            request: request.clone(),
            files: files.to_vec(),
            message: message.to_string(),
        });
        let commit_id = format!("fake-{}", state.commits.len());
        Ok(CommitResult {
            commit_id: commit_id.clone(),
            message: format!("Committed as {}", commit_id),
            metadata: Default::default(),
        })
    }
}

impl RepositoryAdapter for FakeRepository {
    fn name(&self) -> &str {
        "fake"
    }

    fn bot_login(&self) -> &str {
        &self.bot_login
    }
}
