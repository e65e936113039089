//! Repository collaborators for rulekeeper
//!
//! This crate defines the narrow interfaces the lifecycle engine uses to reach
//! the outside world (documents, discussion threads, commits, proposal
//! generation) together with a deterministic in-memory fake, a working-tree
//! adapter, an explicit review cache, bounded retry and the TOML config.

pub mod adapter;
pub mod cache;
pub mod config;
pub mod fake;
pub mod generator;
pub mod local;
pub mod retry;

pub use adapter::{
    Author, Comment, CommentId, CommentKind, CommitResult, CommitWriter, DocumentSource, FileWrite,
    RepositoryAdapter, ReviewRequest, SubmitError, ThreadSource,
};
pub use cache::ReviewCache;
pub use config::{BotConfig, RetryConfig, RulesConfig};
pub use fake::FakeRepository;
pub use generator::{GenerationOutcome, ProposalGenerator, ScriptedGenerator};
pub use local::LocalRepository;
pub use retry::RetryPolicy;
