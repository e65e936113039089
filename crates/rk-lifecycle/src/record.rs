// record.rs — SuggestionRecord: one suggestion and where it is in its life.
//
// The state machine:
//   Suggested → Pending → Applied
//   Suggested → Rejected   (the change log was applied without it)
//   Suggested → DryRun     (simulation mode; terminal)
//
// Records never regress. DryRun records are created in their terminal state
// and are never transitioned again.

use std::fmt;

use chrono::{DateTime, Utc};
use rk_changeset::Proposal;
use rk_submit::ReviewRequest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    /// Posted, waiting for a human to accept it.
    Suggested,
    /// Accepted into the change log, not yet applied.
    Pending,
    /// Committed as part of an applied change log.
    Applied,
    /// The change log was applied without this suggestion.
    Rejected,
    /// Generated in simulation mode; nothing was posted.
    DryRun,
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestionStatus::Suggested => write!(f, "suggested"),
            SuggestionStatus::Pending => write!(f, "pending"),
            SuggestionStatus::Applied => write!(f, "applied"),
            SuggestionStatus::Rejected => write!(f, "rejected"),
            SuggestionStatus::DryRun => write!(f, "dry_run"),
        }
    }
}

impl SuggestionStatus {
    /// Check whether moving from this status to `next` is allowed.
    pub fn can_transition_to(&self, next: SuggestionStatus) -> bool {
        matches!(
            (self, next),
            (SuggestionStatus::Suggested, SuggestionStatus::Pending)
                | (SuggestionStatus::Pending, SuggestionStatus::Applied)
                | (SuggestionStatus::Suggested, SuggestionStatus::Rejected)
                | (SuggestionStatus::Suggested, SuggestionStatus::DryRun)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SuggestionStatus::Applied | SuggestionStatus::Rejected | SuggestionStatus::DryRun
        )
    }
}

/// What a dry run would have posted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DryRunPreview {
    pub thread_root_id: u64,
    pub content: String,
    pub proposal: Proposal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuggestionRecord {
    /// Suggestion comment id, or a UUID for dry runs (nothing was posted).
    pub id: String,
    pub repository: String,
    pub number: u64,
    /// Discussion thread the suggestion answers; the deduplication key.
    pub thread_root_id: u64,
    pub target_path: String,
    /// SHA-256 of the proposal, for spotting identical re-proposals.
    pub proposal_hash: String,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run_preview: Option<DryRunPreview>,
}

impl SuggestionRecord {
    /// A posted suggestion, keyed by the id of the suggestion comment.
    pub fn suggested(
        suggestion_id: u64,
        request: &ReviewRequest,
        thread_root_id: u64,
        proposal: &Proposal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: suggestion_id.to_string(),
            repository: request.repository.clone(),
            number: request.number,
            thread_root_id,
            target_path: proposal.target_path.clone(),
            proposal_hash: proposal.content_hash(),
            status: SuggestionStatus::Suggested,
            created_at: now,
            updated_at: now,
            dry_run_preview: None,
        }
    }

    /// A simulated suggestion that was never posted.
    pub fn dry_run(
        request: &ReviewRequest,
        thread_root_id: u64,
        proposal: &Proposal,
        content: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            repository: request.repository.clone(),
            number: request.number,
            thread_root_id,
            target_path: proposal.target_path.clone(),
            proposal_hash: proposal.content_hash(),
            status: SuggestionStatus::DryRun,
            created_at: now,
            updated_at: now,
            dry_run_preview: Some(DryRunPreview {
                thread_root_id,
                content,
                proposal: proposal.clone(),
            }),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.status == SuggestionStatus::DryRun
    }

    /// True when the record belongs to `request`.
    pub fn belongs_to(&self, request: &ReviewRequest) -> bool {
        self.repository == request.repository && self.number == request.number
    }

    /// Move to `next`, rejecting transitions the state machine forbids.
    pub fn transition(&mut self, next: SuggestionStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                record_id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_changeset::{EditInstruction, ProposalOperation};

    fn proposal() -> Proposal {
        Proposal::new(
            ".cursor/rules/a.mdc",
            ProposalOperation::Update,
            vec![EditInstruction::addition("- x", None)],
            "",
        )
        .unwrap()
    }

    fn request() -> ReviewRequest {
        ReviewRequest::new("acme/widgets", 4)
    }

    #[test]
    fn success_path_transitions() {
        let mut record = SuggestionRecord::suggested(77, &request(), 70, &proposal());
        assert_eq!(record.id, "77");
        record.transition(SuggestionStatus::Pending).unwrap();
        record.transition(SuggestionStatus::Applied).unwrap();
        assert!(record.status.is_terminal());
    }

    #[test]
    fn records_never_regress() {
        let mut record = SuggestionRecord::suggested(1, &request(), 1, &proposal());
        record.transition(SuggestionStatus::Pending).unwrap();
        let err = record.transition(SuggestionStatus::Suggested).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        assert!(record.transition(SuggestionStatus::Rejected).is_err());
        assert_eq!(record.status, SuggestionStatus::Pending);
    }

    #[test]
    fn suggested_can_be_rejected_but_not_applied_directly() {
        assert!(SuggestionStatus::Suggested.can_transition_to(SuggestionStatus::Rejected));
        assert!(!SuggestionStatus::Suggested.can_transition_to(SuggestionStatus::Applied));
    }

    #[test]
    fn dry_run_records_are_terminal() {
        let mut record = SuggestionRecord::dry_run(&request(), 9, &proposal(), "preview".into());
        assert!(record.is_dry_run());
        assert!(Uuid::parse_str(&record.id).is_ok());
        assert!(record.transition(SuggestionStatus::Pending).is_err());
        assert_eq!(record.dry_run_preview.as_ref().unwrap().thread_root_id, 9);
    }

    #[test]
    fn status_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&SuggestionStatus::DryRun).unwrap(),
            "\"dry_run\""
        );
    }
}
