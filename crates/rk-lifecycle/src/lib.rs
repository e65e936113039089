//! # rk-lifecycle
//!
//! Suggestion lifecycle tracking and server state for rulekeeper.
//!
//! A [`SuggestionRecord`] follows one suggestion from the moment it is posted
//! to the moment its review's change log is applied. The
//! [`LifecycleTracker`] turns each inbound comment event into at most one
//! state change: a new suggestion, an acceptance appended to the summary, or
//! an apply that commits the merged rule documents.
//!
//! ## Key components
//!
//! - [`SuggestionRecord`] — the state machine (Suggested → Pending → Applied,
//!   Suggested → Rejected, Suggested → DryRun)
//! - [`ServerState`] — operating mode, connected repositories and a bounded
//!   suggestion history
//! - [`StateStorage`] — storage backends selected by URL
//! - [`StateManager`] — state bound to its storage, saved after every change
//! - [`classify`] — what an inbound comment means
//! - [`LifecycleTracker`] — request-scoped orchestration

pub mod error;
pub mod event;
pub mod manager;
pub mod record;
pub mod state;
pub mod storage;
pub mod tracker;

pub use error::LifecycleError;
pub use event::{classify, CommentEvent, InboundEvent};
pub use manager::StateManager;
pub use record::{DryRunPreview, SuggestionRecord, SuggestionStatus};
pub use state::{ConnectedRepository, ServerMode, ServerState};
pub use storage::{open_storage, FileStorage, MemoryStorage, StateStorage};
pub use tracker::{HandleOutcome, LifecycleTracker};
