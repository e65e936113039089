// lifecycle_flow.rs — End-to-end lifecycle against the in-memory repository.
//
// Flow:
//   1. Human review comments arrive → suggestions are posted (once per thread)
//   2. Suggestions are ticked → the summary accumulates the change log
//   3. The apply command merges the log and commits the rule documents
//   4. The summary is locked; later events change nothing

use rk_changeset::comment::{summary, ACCEPT_PROMPT};
use rk_changeset::{ChangeLog, DocumentSnapshot, EditInstruction, Proposal, ProposalOperation};
use rk_lifecycle::{
    HandleOutcome, InboundEvent, LifecycleError, LifecycleTracker, StateManager, SuggestionStatus,
};
use rk_submit::{
    BotConfig, Comment, FakeRepository, GenerationOutcome, ReviewCache, ReviewRequest,
    ScriptedGenerator, SubmitError,
};

const STYLE: &str = ".cursor/rules/style.mdc";
const TESTING: &str = ".cursor/rules/testing.mdc";
const STYLE_TEXT: &str = "---\ndescription: Style rules\nglobs: \"*.rs\"\n---\n\n# Style\n- Use rustfmt\n";
const APPLY: &str = "/apply-cursor-rules";

struct Harness {
    repo: FakeRepository,
    generator: ScriptedGenerator,
    cache: ReviewCache,
    config: BotConfig,
    state: StateManager,
}

impl Harness {
    /// Simulation mode, as a fresh server starts.
    fn dry_run() -> Self {
        let mut config = BotConfig::default();
        config.retry.base_delay_ms = 0;
        config.retry.max_delay_ms = 0;
        Self {
            repo: FakeRepository::default().with_document(STYLE, STYLE_TEXT),
            generator: ScriptedGenerator::default(),
            cache: ReviewCache::new(),
            config,
            state: StateManager::from_url("memory://").unwrap(),
        }
    }

    fn live() -> Self {
        let mut harness = Self::dry_run();
        harness.state.set_mode(Some(false), None).unwrap();
        harness
    }

    fn request(&self) -> ReviewRequest {
        ReviewRequest::new("acme/widgets", 42)
    }

    fn handle(&mut self, event: &InboundEvent) -> Result<HandleOutcome, LifecycleError> {
        let tracker = LifecycleTracker::new(&self.repo, &self.generator, &self.cache, &self.config);
        tracker.handle(&mut self.state, event)
    }

    fn review_comment(&self, body: &str) -> InboundEvent {
        let comment = self.repo.add_review_comment(
            &self.request(),
            "dev",
            body,
            "src/lib.rs",
            3,
            "@@ -1,3 +1,3 @@",
        );
        InboundEvent::new(self.request(), comment)
    }

    /// Post a review comment and have the generator answer with `proposal`.
    fn suggest(&mut self, proposal: Proposal) -> u64 {
        self.generator.push(GenerationOutcome::Proposal(proposal));
        let event = self.review_comment("please follow the house style");
        match self.handle(&event).unwrap() {
            HandleOutcome::Suggested { suggestion_id, .. } => suggestion_id,
            other => panic!("expected a suggestion, got {:?}", other),
        }
    }

    /// Tick the acceptance box of suggestion `id`, as a reviewer would.
    fn tick(&self, id: u64) -> InboundEvent {
        let suggestion = self.comment(id);
        let body = suggestion.body.replace(
            &format!("- [ ] {}", ACCEPT_PROMPT),
            &format!("- [x] {}", ACCEPT_PROMPT),
        );
        let edited = self.repo.user_edit(&self.request(), id, &body).unwrap();
        InboundEvent::new(self.request(), edited)
    }

    fn apply_command(&self) -> InboundEvent {
        let comment = self.repo.add_issue_comment(&self.request(), "dev", APPLY);
        InboundEvent::new(self.request(), comment)
    }

    fn comment(&self, id: u64) -> Comment {
        self.repo
            .comments(&self.request())
            .into_iter()
            .find(|c| c.id == id)
            .unwrap()
    }

    fn summary(&self) -> Option<Comment> {
        self.repo
            .comments(&self.request())
            .into_iter()
            .find(|c| c.author.is_bot && summary::is_summary(&c.body))
    }

    fn summary_log(&self) -> ChangeLog {
        summary::parse_summary(&self.summary().unwrap().body).unwrap()
    }

    fn status(&self, id: u64) -> SuggestionStatus {
        self.state.state().suggestion(&id.to_string()).unwrap().status
    }
}

fn anchored_addition() -> Proposal {
    Proposal::new(
        STYLE,
        ProposalOperation::Update,
        vec![EditInstruction::addition("- Prefer tabs", Some("- Use rustfmt"))],
        "Reviewers keep asking for tabs.",
    )
    .unwrap()
}

fn appended_addition() -> Proposal {
    Proposal::new(
        STYLE,
        ProposalOperation::Update,
        vec![EditInstruction::addition("- No unwrap outside tests", None)],
        "",
    )
    .unwrap()
}

fn new_document() -> Proposal {
    Proposal::new(
        TESTING,
        ProposalOperation::Create,
        vec![EditInstruction::new_document(
            "# Testing\n- Use tempfile for filesystem tests",
            "Testing rules",
            vec!["tests/**/*.rs".to_string()],
        )],
        "",
    )
    .unwrap()
}

#[test]
fn suggest_accept_apply_end_to_end() {
    let mut h = Harness::live();

    // 1. Suggestions, one per thread.
    let first = h.suggest(anchored_addition());
    let second = h.suggest(appended_addition());
    let third = h.suggest(new_document());
    assert_eq!(h.status(first), SuggestionStatus::Suggested);

    // 2. Acceptances accumulate in order.
    for (n, id) in [first, second, third].into_iter().enumerate() {
        let outcome = h.handle(&h.tick(id)).unwrap();
        assert_eq!(
            outcome,
            HandleOutcome::Accepted {
                suggestion_id: id,
                pending: n + 1
            }
        );
        assert_eq!(h.status(id), SuggestionStatus::Pending);
    }
    let ids: Vec<u64> = h.summary_log().entries().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![first, second, third]);
    assert!(h.summary().unwrap().body.contains(&format!("`{}`", APPLY)));

    // 3. Apply.
    let outcome = h.handle(&h.apply_command()).unwrap();
    match outcome {
        HandleOutcome::Applied {
            commit_id,
            files,
            applied,
        } => {
            assert_eq!(commit_id.as_deref(), Some("fake-1"));
            assert_eq!(files, vec![STYLE.to_string(), TESTING.to_string()]);
            assert_eq!(applied, 3);
        }
        other => panic!("expected an apply, got {:?}", other),
    }

    let style = h.repo.document(STYLE).unwrap();
    assert!(style.starts_with("---\ndescription: Style rules\n"));
    let rustfmt = style.find("- Use rustfmt").unwrap();
    let tabs = style.find("- Prefer tabs").unwrap();
    let unwrap = style.find("- No unwrap outside tests").unwrap();
    assert!(rustfmt < tabs && tabs < unwrap, "unexpected order:\n{}", style);

    let testing = h.repo.document(TESTING).unwrap();
    assert!(testing.contains("description: Testing rules"));
    assert!(testing.ends_with("- Use tempfile for filesystem tests\n"));

    // 4. Locked.
    let locked = h.summary().unwrap();
    assert!(summary::is_applied(&locked.body));
    assert!(h.summary_log().is_applied());
    for id in [first, second, third] {
        assert_eq!(h.status(id), SuggestionStatus::Applied);
    }
}

#[test]
fn second_apply_is_a_no_op() {
    let mut h = Harness::live();
    let id = h.suggest(anchored_addition());
    h.handle(&h.tick(id)).unwrap();
    assert!(matches!(
        h.handle(&h.apply_command()).unwrap(),
        HandleOutcome::Applied { .. }
    ));
    let summary_after_apply = h.summary().unwrap().body;
    let document_after_apply = h.repo.document(STYLE);

    assert_eq!(h.handle(&h.apply_command()).unwrap(), HandleOutcome::AlreadyApplied);
    assert_eq!(h.repo.commits().len(), 1);
    assert_eq!(h.summary().unwrap().body, summary_after_apply);
    assert_eq!(h.repo.document(STYLE), document_after_apply);

    // Later comments on the review are not turned into suggestions.
    h.generator.push(GenerationOutcome::Proposal(appended_addition()));
    let late = h.review_comment("one more thing");
    assert_eq!(h.handle(&late).unwrap(), HandleOutcome::AlreadyApplied);
    assert!(h.generator.calls().len() == 1);
}

#[test]
fn duplicate_delivery_on_a_thread_posts_once() {
    let mut h = Harness::live();
    h.generator.push(GenerationOutcome::Proposal(anchored_addition()));
    h.generator.push(GenerationOutcome::Proposal(anchored_addition()));
    let event = h.review_comment("tabs, please");

    assert!(matches!(h.handle(&event).unwrap(), HandleOutcome::Suggested { .. }));
    assert_eq!(
        h.handle(&event).unwrap(),
        HandleOutcome::Duplicate {
            thread_root: event.comment.id
        }
    );
    assert_eq!(h.repo.comments(&h.request()).len(), 2);
    assert_eq!(h.generator.calls().len(), 1);
}

#[test]
fn accepting_twice_changes_nothing() {
    let mut h = Harness::live();
    let id = h.suggest(anchored_addition());
    let event = h.tick(id);
    h.handle(&event).unwrap();
    let before = h.summary().unwrap();

    assert_eq!(
        h.handle(&event).unwrap(),
        HandleOutcome::AlreadyAccepted { suggestion_id: id }
    );
    assert_eq!(h.summary().unwrap(), before);
}

#[test]
fn unaccepted_suggestions_are_rejected_on_apply() {
    let mut h = Harness::live();
    let accepted = h.suggest(anchored_addition());
    let ignored = h.suggest(appended_addition());
    h.handle(&h.tick(accepted)).unwrap();
    h.handle(&h.apply_command()).unwrap();

    assert_eq!(h.status(accepted), SuggestionStatus::Applied);
    assert_eq!(h.status(ignored), SuggestionStatus::Rejected);
    assert!(!h
        .repo
        .document(STYLE)
        .unwrap()
        .contains("No unwrap outside tests"));
}

#[test]
fn apply_without_acceptances_does_nothing() {
    let mut h = Harness::live();
    assert_eq!(h.handle(&h.apply_command()).unwrap(), HandleOutcome::NothingToApply);
    assert!(h.repo.commits().is_empty());
}

#[test]
fn oversized_acceptance_leaves_the_change_log_unchanged() {
    let mut h = Harness::live();
    let big = Proposal::new(
        STYLE,
        ProposalOperation::Update,
        vec![EditInstruction::addition(format!("- {}", "x".repeat(20_000)), None)],
        "",
    )
    .unwrap();
    let big_id = h.suggest(big);
    let small_id = h.suggest(anchored_addition());
    h.handle(&h.tick(big_id)).unwrap();

    // Put the ceiling 100 bytes above the current summary.
    let before = h.summary().unwrap();
    h.config.summary.byte_ceiling = before.body.len() + 100;

    let outcome = h.handle(&h.tick(small_id)).unwrap();
    match outcome {
        HandleOutcome::SizeExceeded { size, ceiling } => {
            assert_eq!(ceiling, before.body.len() + 100);
            assert!(size > ceiling);
        }
        other => panic!("expected the size guard to refuse, got {:?}", other),
    }
    assert_eq!(h.summary().unwrap(), before);
    assert_eq!(h.summary_log().len(), 1);
    assert_eq!(h.status(small_id), SuggestionStatus::Suggested);
}

#[test]
fn editing_a_document_pending_creation_is_refused_at_acceptance() {
    let mut h = Harness::live();
    let created = h.suggest(new_document());
    let edit = h.suggest(
        Proposal::new(
            TESTING,
            ProposalOperation::Update,
            vec![EditInstruction::addition("- Name tests after behaviour", None)],
            "",
        )
        .unwrap(),
    );
    h.handle(&h.tick(created)).unwrap();
    let before = h.summary().unwrap();

    let outcome = h.handle(&h.tick(edit)).unwrap();
    match outcome {
        HandleOutcome::Rejected { reason } => assert!(reason.contains(TESTING)),
        other => panic!("expected the conflict to be reported, got {:?}", other),
    }
    assert_eq!(h.summary().unwrap(), before);
    assert_eq!(h.summary_log().len(), 1);
    assert_eq!(h.status(edit), SuggestionStatus::Suggested);
    assert_eq!(h.status(created), SuggestionStatus::Pending);
}

#[test]
fn commit_failure_keeps_everything_pending_and_can_be_retried() {
    let mut h = Harness::live();
    let id = h.suggest(anchored_addition());
    h.handle(&h.tick(id)).unwrap();

    h.repo
        .fail_next_commits([SubmitError::VcsError("push rejected".into())]);
    let err = h.handle(&h.apply_command()).unwrap_err();
    assert!(matches!(err, LifecycleError::CommitFailure { .. }));
    assert!(!h.summary_log().is_applied());
    assert_eq!(h.status(id), SuggestionStatus::Pending);
    assert_eq!(h.repo.document(STYLE).as_deref(), Some(STYLE_TEXT));

    let outcome = h.handle(&h.apply_command()).unwrap();
    assert!(matches!(outcome, HandleOutcome::Applied { applied: 1, .. }));
    assert_eq!(h.status(id), SuggestionStatus::Applied);
    assert_eq!(h.repo.commits().len(), 1);
}

#[test]
fn transient_commit_errors_are_retried() {
    let mut h = Harness::live();
    let id = h.suggest(anchored_addition());
    h.handle(&h.tick(id)).unwrap();

    h.repo.fail_next_commits([
        SubmitError::Transient("502".into()),
        SubmitError::RateLimited { retry_after_secs: 0 },
    ]);
    let outcome = h.handle(&h.apply_command()).unwrap();
    assert!(matches!(outcome, HandleOutcome::Applied { .. }));
    assert_eq!(h.repo.commits().len(), 1);
}

#[test]
fn interleaved_acceptance_is_not_dropped() {
    let mut h = Harness::live();
    let first = h.suggest(anchored_addition());
    let second = h.suggest(appended_addition());
    let other = h.suggest(new_document());
    h.handle(&h.tick(first)).unwrap();

    // Another worker accepts `other` right before our edit lands.
    let summary = h.summary().unwrap();
    let mut theirs = summary::parse_summary(&summary.body).unwrap();
    theirs.accept(other, new_document());
    let mut documents = DocumentSnapshot::new();
    documents.insert(STYLE.to_string(), STYLE_TEXT.to_string());
    let their_body = summary::render_summary(&theirs, &documents, APPLY).unwrap();
    h.repo.interfere_before_next_edit(summary.id, their_body);

    let outcome = h.handle(&h.tick(second)).unwrap();
    assert_eq!(
        outcome,
        HandleOutcome::Accepted {
            suggestion_id: second,
            pending: 3
        }
    );
    let ids: Vec<u64> = h.summary_log().entries().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![first, other, second]);
}

#[test]
fn dry_run_records_previews_and_posts_nothing() {
    let mut h = Harness::dry_run();
    h.generator.push(GenerationOutcome::Proposal(anchored_addition()));
    let event = h.review_comment("tabs, please");

    let outcome = h.handle(&event).unwrap();
    let record_id = match outcome {
        HandleOutcome::DryRunSuggested {
            record_id,
            thread_root,
            content,
            ..
        } => {
            assert_eq!(thread_root, event.comment.id);
            assert!(content.contains("- Prefer tabs"));
            record_id
        }
        other => panic!("expected a dry-run preview, got {:?}", other),
    };
    assert_eq!(h.repo.comments(&h.request()).len(), 1);
    let record = h.state.state().suggestion(&record_id).unwrap();
    assert_eq!(record.status, SuggestionStatus::DryRun);
    assert!(record.dry_run_preview.is_some());

    assert!(matches!(
        h.handle(&event).unwrap(),
        HandleOutcome::Duplicate { .. }
    ));
    assert!(matches!(
        h.handle(&h.apply_command()).unwrap(),
        HandleOutcome::DryRun { .. }
    ));
    assert!(h.repo.commits().is_empty());
}

#[test]
fn disabled_repository_is_left_alone() {
    let mut h = Harness::live();
    let event = h.review_comment("tabs, please");
    h.state
        .update(|s| {
            s.touch_repository("acme/widgets", None);
            s.set_repository_enabled("acme/widgets", false);
            Ok(())
        })
        .unwrap();

    assert_eq!(
        h.handle(&event).unwrap(),
        HandleOutcome::RepositoryDisabled {
            repository: "acme/widgets".to_string()
        }
    );
    assert!(h.generator.calls().is_empty());
}
