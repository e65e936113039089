//! # rk-changeset
//!
//! The rule document model and the pure computations over it.
//!
//! A [`Proposal`] is one candidate change to a [`RuleDocument`], expressed as
//! anchor-based [`EditInstruction`]s. Accepted proposals accumulate in a
//! [`ChangeLog`]; [`merge_proposals`] folds them into final document text and
//! [`DocumentDiff`] shows what changed. Nothing in this crate performs I/O.
//!
//! The [`comment`] module renders suggestion and summary comments and
//! decodes the hidden markers they carry.

pub mod anchor;
pub mod changelog;
pub mod comment;
pub mod diff;
pub mod document;
pub mod error;
pub mod merge;
pub mod proposal;
pub mod size_guard;

pub use anchor::AnchorPosition;
pub use changelog::{AcceptOutcome, ChangeLog, ChangeLogEntry};
pub use diff::{line_diff, DiffLine, DiffMarker, DocumentDiff};
pub use document::{DocumentMetadata, DocumentSnapshot, RuleDocument};
pub use error::ChangeSetError;
pub use merge::{group_by_path, merge_proposals, MergeReport};
pub use proposal::{EditInstruction, EditKind, Proposal, ProposalId, ProposalOperation};
pub use size_guard::SizeGuard;
