// tracker.rs — LifecycleTracker: one inbound comment event, start to finish.
//
// Candidate comments become suggestions (dedup, generate, preview, post).
// Ticked suggestions are appended to the review's change log, which lives in
// the summary comment. The apply command merges the log and commits it.
//
// Every state-changing decision re-reads comments fresh; the review cache
// serves only read-mostly lookups and is invalidated after each write. Edits
// to the summary are compare-and-swap on the comment revision and are
// recomputed from fresh state when another writer got there first.

use rk_changeset::comment::{self, summary, SUGGESTION_SIGNATURE};
use rk_changeset::{AcceptOutcome, ChangeLog, ChangeSetError, DocumentSnapshot, SizeGuard};
use rk_submit::generator::{self, GenerationOutcome, ProposalGenerator};
use rk_submit::{
    BotConfig, Comment, CommentId, FileWrite, RepositoryAdapter, RetryPolicy, ReviewCache,
    ReviewRequest, SubmitError,
};
use serde::Serialize;

use crate::error::LifecycleError;
use crate::event::{classify, CommentEvent, InboundEvent};
use crate::manager::StateManager;
use crate::record::{SuggestionRecord, SuggestionStatus};

/// Attempts at a compare-and-swap summary edit before giving up.
pub const MAX_SUMMARY_ATTEMPTS: u32 = 3;

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandleOutcome {
    /// The server is disabled; the event was acknowledged only.
    Disabled,
    RepositoryDisabled { repository: String },
    Ignored { reason: String },
    /// The review's rules were already applied; nothing can change.
    AlreadyApplied,
    /// The thread already has a suggestion.
    Duplicate { thread_root: CommentId },
    NoProposal { reason: String },
    /// The generator's proposal was unusable.
    Rejected { reason: String },
    Suggested {
        suggestion_id: CommentId,
        thread_root: CommentId,
        target_path: String,
    },
    DryRunSuggested {
        record_id: String,
        thread_root: CommentId,
        target_path: String,
        content: String,
    },
    Accepted {
        suggestion_id: CommentId,
        pending: usize,
    },
    AlreadyAccepted { suggestion_id: CommentId },
    /// The summary would outgrow the ceiling; the change log is unchanged.
    SizeExceeded { size: usize, ceiling: usize },
    NothingToApply,
    Applied {
        commit_id: Option<String>,
        files: Vec<String>,
        applied: usize,
    },
    /// Simulation mode: what would have happened.
    DryRun { action: String, detail: String },
}

impl HandleOutcome {
    /// One line for operators.
    pub fn describe(&self) -> String {
        match self {
            HandleOutcome::Disabled => "server is disabled; event acknowledged".to_string(),
            HandleOutcome::RepositoryDisabled { repository } => {
                format!("repository {} is disabled", repository)
            }
            HandleOutcome::Ignored { reason } => format!("ignored: {}", reason),
            HandleOutcome::AlreadyApplied => {
                "rules were already applied for this review".to_string()
            }
            HandleOutcome::Duplicate { thread_root } => {
                format!("thread {} already has a suggestion", thread_root)
            }
            HandleOutcome::NoProposal { reason } => format!("no rule proposed: {}", reason),
            HandleOutcome::Rejected { reason } => format!("proposal rejected: {}", reason),
            HandleOutcome::Suggested {
                suggestion_id,
                target_path,
                ..
            } => format!("posted suggestion {} for {}", suggestion_id, target_path),
            HandleOutcome::DryRunSuggested {
                record_id,
                target_path,
                ..
            } => format!("dry run: recorded preview {} for {}", record_id, target_path),
            HandleOutcome::Accepted {
                suggestion_id,
                pending,
            } => format!(
                "accepted suggestion {} ({} pending in the summary)",
                suggestion_id, pending
            ),
            HandleOutcome::AlreadyAccepted { suggestion_id } => {
                format!("suggestion {} is already in the summary", suggestion_id)
            }
            HandleOutcome::SizeExceeded { size, ceiling } => format!(
                "summary would be {} bytes (ceiling {}); apply the pending suggestions first",
                size, ceiling
            ),
            HandleOutcome::NothingToApply => "no accepted suggestions to apply".to_string(),
            HandleOutcome::Applied {
                commit_id,
                files,
                applied,
            } => format!(
                "applied {} suggestion(s) to {} file(s){}",
                applied,
                files.len(),
                commit_id
                    .as_ref()
                    .map(|id| format!(" in {}", id))
                    .unwrap_or_default()
            ),
            HandleOutcome::DryRun { action, detail } => format!("dry run ({}): {}", action, detail),
        }
    }
}

/// Request-scoped orchestration over the collaborators.
pub struct LifecycleTracker<'a> {
    repo: &'a dyn RepositoryAdapter,
    generator: &'a dyn ProposalGenerator,
    cache: &'a ReviewCache,
    config: &'a BotConfig,
    retry: RetryPolicy,
}

impl<'a> LifecycleTracker<'a> {
    pub fn new(
        repo: &'a dyn RepositoryAdapter,
        generator: &'a dyn ProposalGenerator,
        cache: &'a ReviewCache,
        config: &'a BotConfig,
    ) -> Self {
        Self {
            repo,
            generator,
            cache,
            config,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Handle one comment event, persisting any state change.
    pub fn handle(
        &self,
        state: &mut StateManager,
        event: &InboundEvent,
    ) -> Result<HandleOutcome, LifecycleError> {
        let request = &event.request;
        if state.mode().disabled {
            tracing::info!(request = %request.key(), "server disabled, acknowledging event");
            return Ok(HandleOutcome::Disabled);
        }

        let enabled = state.update(|s| {
            Ok(s.touch_repository(&request.repository, event.installation_id)
                .enabled)
        })?;
        if !enabled {
            tracing::info!(repository = %request.repository, "repository disabled, ignoring event");
            return Ok(HandleOutcome::RepositoryDisabled {
                repository: request.repository.clone(),
            });
        }

        let dry_run = state.mode().dry_run;
        let kind = classify(&event.comment, &self.config.bot.apply_command);
        tracing::debug!(
            request = %request.key(),
            comment_id = event.comment.id,
            event = ?kind,
            "classified comment"
        );

        match kind {
            CommentEvent::Ignored(reason) => Ok(HandleOutcome::Ignored { reason }),
            CommentEvent::ApplyCommand if dry_run => self.preview_apply(request),
            CommentEvent::ApplyCommand => self.apply(state, request),
            CommentEvent::Acceptance => {
                if self.is_applied(request)? {
                    return Ok(HandleOutcome::AlreadyApplied);
                }
                if dry_run {
                    return Ok(HandleOutcome::DryRun {
                        action: "accept".to_string(),
                        detail: format!(
                            "would add suggestion {} to the summary",
                            event.comment.id
                        ),
                    });
                }
                self.accept(state, request, &event.comment)
            }
            CommentEvent::Candidate => {
                if self.is_applied(request)? {
                    return Ok(HandleOutcome::AlreadyApplied);
                }
                self.suggest(state, request, &event.comment, dry_run)
            }
        }
    }

    // ── suggest ──────────────────────────────────────────────────

    fn suggest(
        &self,
        state: &mut StateManager,
        request: &ReviewRequest,
        comment: &Comment,
        dry_run: bool,
    ) -> Result<HandleOutcome, LifecycleError> {
        let thread_root = comment.thread_root();
        let comments = self.fresh_comments(request)?;
        if has_suggestion_for(&comments, thread_root)
            || state
                .state()
                .has_record_for_thread(request, thread_root, dry_run)
        {
            tracing::info!(request = %request.key(), thread_root, "thread already has a suggestion");
            return Ok(HandleOutcome::Duplicate { thread_root });
        }

        let documents = self.rule_documents(request)?;
        let file = match comment.path.as_deref() {
            Some(path) => match self.repo.fetch_document(request, path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(path, error = %e, "could not read commented file, using the diff hunk only");
                    None
                }
            },
            None => None,
        };
        let code_context = generator::code_context(comment, file.as_deref());
        let rules_context = generator::rules_context(&documents, &self.config.rules.extension);

        let proposal = match self.generator.generate(
            &comment.body,
            code_context.as_deref(),
            &rules_context,
        )? {
            GenerationOutcome::NoProposal { reason } => {
                tracing::info!(request = %request.key(), thread_root, reason = %reason, "no rule proposed");
                return Ok(HandleOutcome::NoProposal { reason });
            }
            GenerationOutcome::Proposal(proposal) => proposal,
        };

        if let Some(reason) = self.rejection_reason(&proposal, &documents) {
            tracing::warn!(target_path = %proposal.target_path, reason = %reason, "rejecting proposal");
            return Ok(HandleOutcome::Rejected { reason });
        }

        let existing = documents.get(&proposal.target_path).map(String::as_str);
        let body = match comment::suggestion::render_suggestion(&proposal, thread_root, existing) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(target_path = %proposal.target_path, error = %e, "could not render suggestion");
                return Ok(HandleOutcome::Rejected {
                    reason: e.to_string(),
                });
            }
        };

        if dry_run {
            let record = SuggestionRecord::dry_run(request, thread_root, &proposal, body.clone());
            let record_id = record.id.clone();
            tracing::info!(
                request = %request.key(),
                thread_root,
                record_id = %record_id,
                proposal_hash = %record.proposal_hash,
                "dry run: suggestion recorded, nothing posted"
            );
            state.update(|s| {
                s.add_suggestion(record);
                Ok(())
            })?;
            return Ok(HandleOutcome::DryRunSuggested {
                record_id,
                thread_root,
                target_path: proposal.target_path,
                content: body,
            });
        }

        // Another delivery of the same event may have posted while we were
        // generating.
        if has_suggestion_for(&self.fresh_comments(request)?, thread_root) {
            tracing::info!(request = %request.key(), thread_root, "suggestion appeared while generating");
            return Ok(HandleOutcome::Duplicate { thread_root });
        }

        let posted = self.retry.run("post suggestion", |_| {
            self.repo.post_reply(request, thread_root, &body)
        })?;
        self.cache.invalidate_comments(request);

        let record = SuggestionRecord::suggested(posted.id, request, thread_root, &proposal);
        tracing::info!(
            request = %request.key(),
            thread_root,
            suggestion_id = posted.id,
            target_path = %proposal.target_path,
            proposal_hash = %record.proposal_hash,
            "posted suggestion"
        );
        state.update(|s| {
            s.add_suggestion(record);
            Ok(())
        })?;

        Ok(HandleOutcome::Suggested {
            suggestion_id: posted.id,
            thread_root,
            target_path: proposal.target_path,
        })
    }

    fn rejection_reason(
        &self,
        proposal: &rk_changeset::Proposal,
        documents: &DocumentSnapshot,
    ) -> Option<String> {
        if let Err(e) = proposal.validate() {
            return Some(e.to_string());
        }
        let rules = &self.config.rules;
        if !rules.contains(&proposal.target_path) {
            return Some(format!(
                "{} is not under {}",
                proposal.target_path, rules.directory
            ));
        }
        if !rules.has_extension(&proposal.target_path) {
            return Some(format!(
                "{} is not a .{} document",
                proposal.target_path, rules.extension
            ));
        }
        if proposal.creates_document() && documents.contains_key(&proposal.target_path) {
            return Some(format!("{} already exists", proposal.target_path));
        }
        None
    }

    // ── accept ───────────────────────────────────────────────────

    fn accept(
        &self,
        state: &mut StateManager,
        request: &ReviewRequest,
        suggestion: &Comment,
    ) -> Result<HandleOutcome, LifecycleError> {
        let proposal = match comment::extract_proposal(&suggestion.body) {
            Ok(Some(proposal)) => proposal,
            Ok(None) => {
                return Ok(HandleOutcome::Ignored {
                    reason: "suggestion carries no proposal".to_string(),
                })
            }
            Err(e) => {
                tracing::warn!(suggestion_id = suggestion.id, error = %e, "undecodable suggestion");
                return Ok(HandleOutcome::Rejected {
                    reason: e.to_string(),
                });
            }
        };
        let guard = SizeGuard::new(self.config.summary.byte_ceiling);

        for attempt in 0..MAX_SUMMARY_ATTEMPTS {
            let comments = self.fresh_comments(request)?;
            let current = find_summary(&comments);
            let mut log = match current {
                Some(c) => summary::parse_summary(&c.body)?,
                None => ChangeLog::new(),
            };

            match log.accept(suggestion.id, proposal.clone()) {
                AcceptOutcome::Accepted => {}
                AcceptOutcome::Duplicate => {
                    return Ok(HandleOutcome::AlreadyAccepted {
                        suggestion_id: suggestion.id,
                    })
                }
                AcceptOutcome::AlreadyApplied => return Ok(HandleOutcome::AlreadyApplied),
            }

            let documents = self.touched_documents(request, &log, false)?;
            let body = match summary::render_summary(&log, &documents, &self.config.bot.apply_command) {
                Ok(body) => body,
                Err(
                    e @ (ChangeSetError::DuplicateNewFile { .. }
                    | ChangeSetError::NewDocumentConflict { .. }),
                ) => {
                    tracing::warn!(
                        request = %request.key(),
                        suggestion_id = suggestion.id,
                        error = %e,
                        "acceptance conflicts with the pending change log, nothing written"
                    );
                    return Ok(HandleOutcome::Rejected {
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            };
            match guard.check(&body) {
                Ok(()) => {}
                Err(ChangeSetError::SizeExceeded { size, ceiling }) => {
                    tracing::warn!(
                        request = %request.key(),
                        suggestion_id = suggestion.id,
                        size,
                        ceiling,
                        "acceptance would overflow the summary, nothing written"
                    );
                    return Ok(HandleOutcome::SizeExceeded { size, ceiling });
                }
                Err(e) => return Err(e.into()),
            }

            let written = match current {
                Some(c) => self.retry.run("edit summary", |_| {
                    self.repo.edit_comment(request, c.id, c.revision, &body)
                }),
                None => self
                    .retry
                    .run("post summary", |_| self.repo.post_comment(request, &body)),
            };
            match written {
                Ok(_) => {}
                Err(SubmitError::RevisionConflict {
                    expected, actual, ..
                }) => {
                    tracing::warn!(
                        request = %request.key(),
                        attempt,
                        expected,
                        actual,
                        "summary changed underneath us, recomputing"
                    );
                    self.cache.invalidate_comments(request);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            self.cache.invalidate_comments(request);

            let id = suggestion.id.to_string();
            state.update(|s| {
                if let Err(e) = s.transition_suggestion(&id, SuggestionStatus::Pending) {
                    tracing::warn!(suggestion_id = %id, error = %e, "suggestion record not moved to pending");
                }
                Ok(())
            })?;
            tracing::info!(
                request = %request.key(),
                suggestion_id = suggestion.id,
                pending = log.len(),
                "accepted suggestion"
            );
            return Ok(HandleOutcome::Accepted {
                suggestion_id: suggestion.id,
                pending: log.len(),
            });
        }

        Err(SubmitError::InvalidState(format!(
            "summary for {} kept changing; gave up after {} attempts",
            request.key(),
            MAX_SUMMARY_ATTEMPTS
        ))
        .into())
    }

    // ── apply ────────────────────────────────────────────────────

    fn apply(
        &self,
        state: &mut StateManager,
        request: &ReviewRequest,
    ) -> Result<HandleOutcome, LifecycleError> {
        for attempt in 0..MAX_SUMMARY_ATTEMPTS {
            let comments = self.fresh_comments(request)?;
            let Some(current) = find_summary(&comments).cloned() else {
                return Ok(HandleOutcome::NothingToApply);
            };
            let mut log = summary::parse_summary(&current.body)?;
            if log.is_applied() {
                tracing::info!(request = %request.key(), "rules already applied, nothing to do");
                return Ok(HandleOutcome::AlreadyApplied);
            }
            if log.is_empty() {
                return Ok(HandleOutcome::NothingToApply);
            }

            let documents = self.touched_documents(request, &log, true)?;
            let files: Vec<FileWrite> = log
                .merge(&documents)?
                .into_iter()
                .filter(|report| documents.get(&report.path) != Some(&report.text))
                .map(|report| FileWrite {
                    path: report.path,
                    content: report.text,
                })
                .collect();

            // Last look before the irreversible step.
            let latest = self.fresh_comments(request)?;
            match find_summary(&latest) {
                Some(c) if summary::is_applied(&c.body) => return Ok(HandleOutcome::AlreadyApplied),
                Some(c) if c.id == current.id && c.revision == current.revision => {}
                _ => {
                    tracing::warn!(request = %request.key(), attempt, "summary changed before commit, recomputing");
                    continue;
                }
            }

            let commit_id = if files.is_empty() {
                tracing::info!(request = %request.key(), "merged documents are unchanged, nothing to commit");
                None
            } else {
                let message = commit_message(request, &log, &files);
                let result = self
                    .retry
                    .run("commit rules", |_| self.repo.write_commit(request, &files, &message))
                    .map_err(|source| {
                        tracing::error!(request = %request.key(), error = %source, "commit failed, change log left pending");
                        LifecycleError::CommitFailure {
                            request: request.key(),
                            source,
                        }
                    })?;
                Some(result.commit_id)
            };
            self.cache.invalidate(request);

            log.mark_applied();
            let body = summary::render_summary(&log, &documents, &self.config.bot.apply_command)?;
            self.write_applied_summary(request, &current, &log, &body)?;

            let applied_ids: Vec<String> = log.entries().iter().map(|e| e.id.to_string()).collect();
            let rejected = state.update(|s| {
                for id in &applied_ids {
                    if let Err(e) = s.transition_suggestion(id, SuggestionStatus::Applied) {
                        tracing::warn!(suggestion_id = %id, error = %e, "suggestion record not moved to applied");
                    }
                }
                Ok(s.reject_unaccepted(request))
            })?;

            let paths: Vec<String> = files.into_iter().map(|f| f.path).collect();
            tracing::info!(
                request = %request.key(),
                commit_id = commit_id.as_deref().unwrap_or("-"),
                files = paths.len(),
                applied = log.len(),
                rejected,
                "applied rule changes"
            );
            return Ok(HandleOutcome::Applied {
                commit_id,
                files: paths,
                applied: log.len(),
            });
        }

        Err(SubmitError::InvalidState(format!(
            "summary for {} kept changing; gave up after {} attempts",
            request.key(),
            MAX_SUMMARY_ATTEMPTS
        ))
        .into())
    }

    /// Lock the summary once the commit has landed.
    ///
    /// The commit already happened, so a conflicting edit is overwritten with
    /// the applied log rather than recomputed.
    fn write_applied_summary(
        &self,
        request: &ReviewRequest,
        current: &Comment,
        log: &ChangeLog,
        body: &str,
    ) -> Result<(), LifecycleError> {
        let mut revision = current.revision;
        for attempt in 0..MAX_SUMMARY_ATTEMPTS {
            match self.retry.run("lock summary", |_| {
                self.repo.edit_comment(request, current.id, revision, body)
            }) {
                Ok(_) => {
                    self.cache.invalidate_comments(request);
                    return Ok(());
                }
                Err(SubmitError::RevisionConflict { actual, .. }) => {
                    let fresh = self.fresh_comments(request)?;
                    if let Some(latest) = fresh.iter().find(|c| c.id == current.id) {
                        if let Ok(newer) = summary::parse_summary(&latest.body) {
                            let late = newer
                                .entries()
                                .iter()
                                .filter(|e| !log.contains(e.id))
                                .count();
                            if late > 0 {
                                tracing::warn!(
                                    request = %request.key(),
                                    late,
                                    "suggestions accepted during apply were not applied"
                                );
                            }
                        }
                    }
                    tracing::warn!(request = %request.key(), attempt, actual, "summary changed during apply, overwriting");
                    revision = actual;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(SubmitError::InvalidState(format!(
            "could not lock summary for {}",
            request.key()
        ))
        .into())
    }

    fn preview_apply(&self, request: &ReviewRequest) -> Result<HandleOutcome, LifecycleError> {
        let comments = self.fresh_comments(request)?;
        let detail = match find_summary(&comments) {
            None => "no summary yet, nothing would be applied".to_string(),
            Some(c) => {
                let log = summary::parse_summary(&c.body)?;
                if log.is_applied() {
                    "rules already applied".to_string()
                } else if log.is_empty() {
                    "nothing would be applied".to_string()
                } else {
                    let paths: Vec<String> = log.groups().into_iter().map(|(p, _)| p).collect();
                    format!(
                        "would apply {} suggestion(s) to {}",
                        log.len(),
                        paths.join(", ")
                    )
                }
            }
        };
        Ok(HandleOutcome::DryRun {
            action: "apply".to_string(),
            detail,
        })
    }

    // ── reads ────────────────────────────────────────────────────

    /// Comments read past the cache, refreshing it.
    fn fresh_comments(&self, request: &ReviewRequest) -> Result<Vec<Comment>, LifecycleError> {
        self.cache.invalidate_comments(request);
        Ok(self
            .cache
            .comments_or_fetch(request, || self.repo.fetch_comments(request))?)
    }

    fn is_applied(&self, request: &ReviewRequest) -> Result<bool, LifecycleError> {
        let comments = self.fresh_comments(request)?;
        Ok(find_summary(&comments)
            .map(|c| summary::is_applied(&c.body))
            .unwrap_or(false))
    }

    /// Every rule document in the rules directory, through the cache.
    fn rule_documents(&self, request: &ReviewRequest) -> Result<DocumentSnapshot, LifecycleError> {
        let rules = &self.config.rules;
        let mut documents = DocumentSnapshot::new();
        for path in self.repo.list_documents(request, &rules.directory)? {
            if !rules.has_extension(&path) {
                continue;
            }
            let text = self.cache.document_or_fetch(request, &path, || {
                self.repo.fetch_document(request, &path)
            })?;
            if let Some(text) = text {
                documents.insert(path, text);
            }
        }
        Ok(documents)
    }

    /// The current text of every path the log touches.
    fn touched_documents(
        &self,
        request: &ReviewRequest,
        log: &ChangeLog,
        fresh: bool,
    ) -> Result<DocumentSnapshot, LifecycleError> {
        let mut documents = DocumentSnapshot::new();
        for (path, _) in log.groups() {
            let text = if fresh {
                self.repo.fetch_document(request, &path)?
            } else {
                self.cache.document_or_fetch(request, &path, || {
                    self.repo.fetch_document(request, &path)
                })?
            };
            if let Some(text) = text {
                documents.insert(path, text);
            }
        }
        Ok(documents)
    }
}

/// The bot's summary comment, if one was posted.
fn find_summary(comments: &[Comment]) -> Option<&Comment> {
    comments
        .iter()
        .find(|c| c.author.is_bot && summary::is_summary(&c.body))
}

/// True when a bot suggestion already answers `thread_root`.
fn has_suggestion_for(comments: &[Comment], thread_root: CommentId) -> bool {
    comments.iter().any(|c| {
        c.author.is_bot
            && c.body.contains(SUGGESTION_SIGNATURE)
            && comment::extract_thread_root(&c.body) == Some(thread_root)
    })
}

fn commit_message(request: &ReviewRequest, log: &ChangeLog, files: &[FileWrite]) -> String {
    let mut message = format!(
        "Apply {} rule suggestion(s) from review #{}\n\n",
        log.len(),
        request.number
    );
    for file in files {
        message.push_str(&format!("- {}\n", file.path));
    }
    message
}
