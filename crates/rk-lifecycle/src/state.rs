// state.rs — Process-wide server state.
//
// Operating mode, the registry of connected repositories, and a bounded
// history of suggestion records (oldest dropped first). Everything here is
// plain data; persistence lives in `manager.rs`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rk_submit::ReviewRequest;
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;
use crate::record::{SuggestionRecord, SuggestionStatus};

/// Default number of suggestion records kept.
pub const DEFAULT_MAX_HISTORY: usize = 250;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerMode {
    /// Acknowledge every event without processing it.
    #[serde(default)]
    pub disabled: bool,

    /// Process events but post, edit and commit nothing.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_dry_run() -> bool {
    true
}

impl Default for ServerMode {
    fn default() -> Self {
        Self {
            disabled: false,
            dry_run: default_dry_run(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectedRepository {
    /// `owner/name`
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<u64>,
    pub connected_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerState {
    #[serde(default)]
    pub mode: ServerMode,

    /// Keyed by full name.
    #[serde(default)]
    pub repositories: BTreeMap<String, ConnectedRepository>,

    /// Oldest first.
    #[serde(default)]
    pub recent_suggestions: Vec<SuggestionRecord>,

    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            mode: ServerMode::default(),
            repositories: BTreeMap::new(),
            recent_suggestions: Vec::new(),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl ServerState {
    /// Append a record, dropping the oldest beyond `max_history`.
    pub fn add_suggestion(&mut self, record: SuggestionRecord) {
        self.recent_suggestions.push(record);
        let max = self.max_history.max(1);
        if self.recent_suggestions.len() > max {
            let excess = self.recent_suggestions.len() - max;
            self.recent_suggestions.drain(..excess);
        }
    }

    pub fn suggestion(&self, id: &str) -> Option<&SuggestionRecord> {
        self.recent_suggestions.iter().find(|s| s.id == id)
    }

    /// True when a record already covers `thread_root_id` on `request`.
    ///
    /// Dry-run previews and posted suggestions are tracked apart, so leaving
    /// simulation mode does not suppress the real suggestion.
    pub fn has_record_for_thread(
        &self,
        request: &ReviewRequest,
        thread_root_id: u64,
        dry_run: bool,
    ) -> bool {
        self.recent_suggestions.iter().any(|s| {
            s.belongs_to(request) && s.thread_root_id == thread_root_id && s.is_dry_run() == dry_run
        })
    }

    /// Move record `id` to `status`.
    ///
    /// Returns `Ok(false)` when no such record is kept (it may have aged out
    /// of the history) or when it is a dry run, which never transitions.
    pub fn transition_suggestion(
        &mut self,
        id: &str,
        status: SuggestionStatus,
    ) -> Result<bool, LifecycleError> {
        match self.recent_suggestions.iter_mut().find(|s| s.id == id) {
            Some(record) if record.is_dry_run() => Ok(false),
            Some(record) => {
                record.transition(status)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reject every record of `request` still waiting in `Suggested`.
    pub fn reject_unaccepted(&mut self, request: &ReviewRequest) -> usize {
        let mut rejected = 0;
        for record in self
            .recent_suggestions
            .iter_mut()
            .filter(|s| s.belongs_to(request) && s.status == SuggestionStatus::Suggested)
        {
            if record.transition(SuggestionStatus::Rejected).is_ok() {
                rejected += 1;
            }
        }
        rejected
    }

    /// Register `full_name` on first sight (enabled) and bump its activity.
    pub fn touch_repository(
        &mut self,
        full_name: &str,
        installation_id: Option<u64>,
    ) -> &ConnectedRepository {
        let now = Utc::now();
        let repo = self
            .repositories
            .entry(full_name.to_string())
            .or_insert_with(|| {
                tracing::info!(repository = full_name, "registering repository");
                ConnectedRepository {
                    full_name: full_name.to_string(),
                    installation_id,
                    connected_at: now,
                    last_active: now,
                    enabled: true,
                }
            });
        repo.last_active = now;
        if installation_id.is_some() {
            repo.installation_id = installation_id;
        }
        repo
    }

    /// Enable or disable a known repository. Returns false if unknown.
    pub fn set_repository_enabled(&mut self, full_name: &str, enabled: bool) -> bool {
        match self.repositories.get_mut(full_name) {
            Some(repo) => {
                repo.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_repository_enabled(&self, full_name: &str) -> bool {
        self.repositories
            .get(full_name)
            .map(|r| r.enabled)
            .unwrap_or(false)
    }

    /// Most recent records first, optionally for one repository.
    pub fn recent(&self, repository: Option<&str>, limit: usize) -> Vec<&SuggestionRecord> {
        self.recent_suggestions
            .iter()
            .rev()
            .filter(|s| repository.map_or(true, |r| s.repository == r))
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_changeset::{EditInstruction, Proposal, ProposalOperation};

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
    fn history_is_bounded() {
        let mut state = ServerState {
            max_history: 3,
            ..ServerState::default()
        };
        for id in 0..5 {
            state.add_suggestion(SuggestionRecord::suggested(id, &request(), id, &proposal()));
        }
        let ids: Vec<_> = state.recent_suggestions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "4"]);
    }

    #[test]
    fn dry_run_records_are_never_transitioned() {
        let mut state = ServerState::default();
        let record = SuggestionRecord::dry_run(&request(), 5, &proposal(), "p".into());
        let id = record.id.clone();
        state.add_suggestion(record);
        assert!(!state.transition_suggestion(&id, SuggestionStatus::Pending).unwrap());
        assert_eq!(state.suggestion(&id).unwrap().status, SuggestionStatus::DryRun);
    }

    #[test]
    fn thread_records_are_split_by_mode() {
        let mut state = ServerState::default();
        state.add_suggestion(SuggestionRecord::dry_run(&request(), 5, &proposal(), "p".into()));
        assert!(state.has_record_for_thread(&request(), 5, true));
        assert!(!state.has_record_for_thread(&request(), 5, false));
        assert!(!state.has_record_for_thread(&request(), 6, true));
    }

    #[test]
    fn unknown_record_transition_is_not_an_error() {
        let mut state = ServerState::default();
        assert!(!state.transition_suggestion("404", SuggestionStatus::Pending).unwrap());
    }

    #[test]
    fn reject_unaccepted_only_touches_suggested_records_of_the_request() {
        let mut state = ServerState::default();
        state.add_suggestion(SuggestionRecord::suggested(1, &request(), 1, &proposal()));
        state.add_suggestion(SuggestionRecord::suggested(2, &request(), 2, &proposal()));
        let other = ReviewRequest::new("acme/widgets", 5);
        state.add_suggestion(SuggestionRecord::suggested(3, &other, 3, &proposal()));
        state.transition_suggestion("2", SuggestionStatus::Pending).unwrap();

        assert_eq!(state.reject_unaccepted(&request()), 1);
        assert_eq!(state.suggestion("1").unwrap().status, SuggestionStatus::Rejected);
        assert_eq!(state.suggestion("2").unwrap().status, SuggestionStatus::Pending);
        assert_eq!(state.suggestion("3").unwrap().status, SuggestionStatus::Suggested);
    }

    #[test]
    fn repositories_register_enabled_on_first_sight() {
        let mut state = ServerState::default();
        assert!(!state.is_repository_enabled("acme/widgets"));
        state.touch_repository("acme/widgets", Some(12));
        assert!(state.is_repository_enabled("acme/widgets"));
        assert!(state.set_repository_enabled("acme/widgets", false));
        state.touch_repository("acme/widgets", None);
        assert!(!state.is_repository_enabled("acme/widgets"));
        assert_eq!(state.repositories["acme/widgets"].installation_id, Some(12));
        assert!(!state.set_repository_enabled("other/repo", true));
    }

    #[test]
    fn default_mode_is_dry_run() {
        let state: ServerState = serde_json::from_str("{}").unwrap();
        assert!(state.mode.dry_run);
        assert!(!state.mode.disabled);
        assert_eq!(state.max_history, 250);
    }

    #[test]
    fn recent_is_newest_first() {
        let mut state = ServerState::default();
        for id in 0..4 {
            state.add_suggestion(SuggestionRecord::suggested(id, &request(), id, &proposal()));
        }
        let ids: Vec<_> = state.recent(None, 2).iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec!["3", "2"]);
        assert!(state.recent(Some("other/repo"), 10).is_empty());
    }
}
