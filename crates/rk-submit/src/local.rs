//! Working-tree adapter for local runs
//!
//! Documents are files in the working tree. Discussion threads are JSON
//! files under `.rulekeeper/threads/<number>.json`, one per review request,
//! so an operator can drive the whole lifecycle without a hosting platform.
//! Commits write the files and, when enabled, run `git add` + `git commit`.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use crate::adapter::{
    Author, Comment, CommentId, CommentKind, CommitResult, CommitWriter, DocumentSource, FileWrite,
    RepositoryAdapter, Result, ReviewRequest, SubmitError, ThreadSource,
};

/// Thread files live here, relative to the working tree.
pub const THREADS_DIR: &str = ".rulekeeper/threads";

/// On-disk form of one review request's comments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadFile {
    #[serde(default)]
    pub next_id: CommentId,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Adapter over a local working tree
pub struct LocalRepository {
    /// Working directory for file and git operations
    work_dir: PathBuf,
    bot_login: String,
    /// Run git add/commit after writing files
    use_git: bool,
}

impl LocalRepository {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            bot_login: "rulekeeper[bot]".to_string(),
            use_git: false,
        }
    }

    pub fn with_git(mut self, use_git: bool) -> Self {
        self.use_git = use_git;
        self
    }

    pub fn with_bot_login(mut self, login: impl Into<String>) -> Self {
        self.bot_login = login.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Run a git command in the working directory
    fn git_cmd(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SubmitError::VcsError(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Resolve a repository-relative path, refusing anything that escapes
    /// the working tree.
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.is_empty() || escapes {
            return Err(SubmitError::Validation(format!(
                "path '{}' must be relative and stay inside the working tree",
                relative
            )));
        }
        Ok(self.work_dir.join(path))
    }

    fn thread_path(&self, request: &ReviewRequest) -> PathBuf {
        self.work_dir
            .join(THREADS_DIR)
            .join(format!("{}.json", request.number))
    }

    /// Load the thread file for `request`; a missing file is an empty thread.
    pub fn load_thread(&self, request: &ReviewRequest) -> Result<ThreadFile> {
        let path = self.thread_path(request);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ThreadFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_thread(&self, request: &ReviewRequest, thread: &ThreadFile) -> Result<()> {
        let path = self.thread_path(request);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(thread)?)?;
        Ok(())
    }

    /// Append a comment to the thread file, assigning it the next id.
    pub fn append_comment(&self, request: &ReviewRequest, mut comment: Comment) -> Result<Comment> {
        let mut thread = self.load_thread(request)?;
        let max_existing = thread.comments.iter().map(|c| c.id).max().unwrap_or(0);
        thread.next_id = thread.next_id.max(max_existing) + 1;
        comment.id = thread.next_id;
        comment.created_at = chrono::Utc::now();
        thread.comments.push(comment.clone());
        self.save_thread(request, &thread)?;
        Ok(comment)
    }

    fn bot_comment(&self, kind: CommentKind, body: &str) -> Comment {
        Comment {
            id: 0,
            kind,
            body: body.to_string(),
            author: Author::bot(self.bot_login.clone()),
            in_reply_to: None,
            path: None,
            line: None,
            diff_hunk: None,
            revision: 0,
            created_at: Default::default(),
        }
    }

    fn collect_files(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect_files(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.work_dir) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
        Ok(())
    }
}

impl DocumentSource for LocalRepository {
    fn fetch_document(&self, _request: &ReviewRequest, path: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.resolve(path)?) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_documents(&self, _request: &ReviewRequest, directory: &str) -> Result<Vec<String>> {
        let root = self.resolve(directory)?;
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        self.collect_files(&root, &mut out)?;
        out.sort();
        Ok(out)
    }
}

impl ThreadSource for LocalRepository {
    fn fetch_comments(&self, request: &ReviewRequest) -> Result<Vec<Comment>> {
        Ok(self.load_thread(request)?.comments)
    }

    fn post_reply(&self, request: &ReviewRequest, thread_root: CommentId, body: &str) -> Result<Comment> {
        let mut comment = self.bot_comment(CommentKind::Review, body);
        comment.in_reply_to = Some(thread_root);
        self.append_comment(request, comment)
    }

    fn post_comment(&self, request: &ReviewRequest, body: &str) -> Result<Comment> {
        self.append_comment(request, self.bot_comment(CommentKind::Issue, body))
    }

    fn edit_comment(
        &self,
        request: &ReviewRequest,
        id: CommentId,
        expected_revision: u64,
        body: &str,
    ) -> Result<Comment> {
        let mut thread = self.load_thread(request)?;
        let comment = thread
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| SubmitError::NotFound(format!("comment {} on {}", id, request.key())))?;
        if comment.revision != expected_revision {
            return Err(SubmitError::RevisionConflict {
                id,
                expected: expected_revision,
                actual: comment.revision,
            });
        }
        comment.body = body.to_string();
        comment.revision += 1;
        let updated = comment.clone();
        self.save_thread(request, &thread)?;
        Ok(updated)
    }
}

impl CommitWriter for LocalRepository {
    fn write_commit(&self, request: &ReviewRequest, files: &[FileWrite], message: &str) -> Result<CommitResult> {
        if files.is_empty() {
            return Err(SubmitError::InvalidState("No files to commit".to_string()));
        }

        let targets = files
            .iter()
            .map(|f| self.resolve(&f.path))
            .collect::<Result<Vec<_>>>()?;
        for (file, target) in files.iter().zip(&targets) {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, &file.content)?;
        }
        tracing::info!(request = %request.key(), files = files.len(), "LocalRepository: wrote files");

        if !self.use_git {
            return Ok(CommitResult {
                commit_id: format!("worktree-{}", request.number),
                message: format!("Wrote {} file(s) to the working tree", files.len()),
                metadata: Default::default(),
            });
        }

        let mut add_args = vec!["add", "--"];
        add_args.extend(files.iter().map(|f| f.path.as_str()));
        self.git_cmd(&add_args)?;
        self.git_cmd(&["commit", "-m", message])?;
        let commit_id = self.git_cmd(&["rev-parse", "HEAD"])?;
        let short = commit_id.get(..8).unwrap_or(&commit_id).to_string();

        Ok(CommitResult {
            commit_id: commit_id.clone(),
            message: format!("Committed as {}", short),
            metadata: [("full_hash".to_string(), commit_id)].into_iter().collect(),
        })
    }
}

impl RepositoryAdapter for LocalRepository {
    fn name(&self) -> &str {
        "local"
    }

    fn bot_login(&self) -> &str {
        &self.bot_login
    }
}
