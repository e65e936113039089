// changelog.rs — The ordered, append-only log of accepted proposals.
//
// One ChangeLog exists per review request. Entries are kept in acceptance
// order, which the merge engine depends on. Once `applied` is set the log is
// frozen: further acceptances report `AlreadyApplied` and change nothing.
//
// The serialized form is the hidden payload carried by the summary comment:
// `{"suggestions":[{"id":..,"proposal":{..}}]}`. The applied flag is not
// part of that payload; it is signalled by the applied banner instead.

use serde::{Deserialize, Serialize};

use crate::document::DocumentSnapshot;
use crate::error::ChangeSetError;
use crate::merge::{self, MergeReport};
use crate::proposal::{Proposal, ProposalId};

/// One accepted proposal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeLogEntry {
    pub id: ProposalId,
    pub proposal: Proposal,
}

/// Result of trying to add a proposal to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The entry was appended.
    Accepted,
    /// An entry with this id already exists; nothing changed.
    Duplicate,
    /// The log is applied and immutable; nothing changed.
    AlreadyApplied,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeLog {
    #[serde(rename = "suggestions", default)]
    entries: Vec<ChangeLogEntry>,

    #[serde(skip)]
    applied: bool,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from its entries and applied flag.
    pub fn from_parts(entries: Vec<ChangeLogEntry>, applied: bool) -> Self {
        Self { entries, applied }
    }

    pub fn entries(&self) -> &[ChangeLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn contains(&self, id: ProposalId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Append an accepted proposal, preserving acceptance order.
    pub fn accept(&mut self, id: ProposalId, proposal: Proposal) -> AcceptOutcome {
        if self.applied {
            return AcceptOutcome::AlreadyApplied;
        }
        if self.contains(id) {
            return AcceptOutcome::Duplicate;
        }
        self.entries.push(ChangeLogEntry { id, proposal });
        AcceptOutcome::Accepted
    }

    /// Freeze the log. Irreversible.
    pub fn mark_applied(&mut self) {
        self.applied = true;
    }

    /// Proposals grouped by target path, paths in first-acceptance order.
    pub fn groups(&self) -> Vec<(String, Vec<&Proposal>)> {
        merge::group_by_path(self.entries.iter().map(|e| &e.proposal))
    }

    /// Merge every group against the current documents.
    pub fn merge(&self, documents: &DocumentSnapshot) -> Result<Vec<MergeReport>, ChangeSetError> {
        self.groups()
            .into_iter()
            .map(|(path, proposals)| {
                merge::merge_proposals(&path, documents.get(&path).map(String::as_str), &proposals)
            })
            .collect()
    }

    /// Encode the hidden summary payload.
    pub fn to_payload(&self) -> Result<String, ChangeSetError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a hidden summary payload.
    pub fn from_payload(json: &str, applied: bool) -> Result<Self, ChangeSetError> {
        let mut log: ChangeLog = serde_json::from_str(json)?;
        log.applied = applied;
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{EditInstruction, ProposalOperation};

    fn proposal(path: &str, content: &str) -> Proposal {
        Proposal::new(
            path,
            ProposalOperation::Update,
            vec![EditInstruction::addition(content, None)],
            "",
        )
        .unwrap()
    }

    #[test]
    fn accept_preserves_order_and_rejects_duplicates() {
        let mut log = ChangeLog::new();
        assert_eq!(log.accept(10, proposal("a.mdc", "one")), AcceptOutcome::Accepted);
        assert_eq!(log.accept(7, proposal("a.mdc", "two")), AcceptOutcome::Accepted);
        assert_eq!(log.accept(10, proposal("a.mdc", "again")), AcceptOutcome::Duplicate);
        let ids: Vec<_> = log.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 7]);
    }

    #[test]
    fn applied_log_is_frozen() {
        let mut log = ChangeLog::new();
        log.accept(1, proposal("a.mdc", "one"));
        log.mark_applied();
        assert_eq!(log.accept(2, proposal("a.mdc", "two")), AcceptOutcome::AlreadyApplied);
        assert_eq!(log.len(), 1);
        assert!(log.is_applied());
    }

    #[test]
    fn payload_uses_suggestions_key() {
        let mut log = ChangeLog::new();
        log.accept(42, proposal("a.mdc", "x"));
        let json = log.to_payload().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["suggestions"][0]["id"], 42);
        assert_eq!(value["suggestions"][0]["proposal"]["target_path"], "a.mdc");

        let restored = ChangeLog::from_payload(&json, true).unwrap();
        assert_eq!(restored.entries(), log.entries());
        assert!(restored.is_applied());
    }

    #[test]
    fn merge_covers_every_path() {
        let mut log = ChangeLog::new();
        log.accept(1, proposal("a.mdc", "- a"));
        log.accept(2, proposal("b.mdc", "- b"));
        log.accept(3, proposal("a.mdc", "- a2"));

        let mut docs = DocumentSnapshot::new();
        docs.insert("a.mdc".into(), "# A\n".into());
        let reports = log.merge(&docs).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].path, "a.mdc");
        // Newest first: "- a2" is appended before "- a".
        assert_eq!(reports[0].text, "# A\n- a2\n- a");
        assert_eq!(reports[1].text, "- b");
    }
}
