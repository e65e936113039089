// handle.rs — Run one comment event through the lifecycle tracker.
//
// The working tree stands in for the repository host: rule documents are read
// from it, threads live under .rulekeeper/threads/, and applies write files
// (and commit them with --git). Proposal generation is not wired to any
// model here; pass --proposal to script what the generator answers.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use rk_changeset::Proposal;
use rk_lifecycle::{InboundEvent, LifecycleTracker};
use rk_submit::{GenerationOutcome, LocalRepository, ReviewCache, ScriptedGenerator};

use super::{read_text, CliContext};

#[derive(Args)]
pub struct HandleArgs {
    /// Event JSON: `{"request": {...}, "comment": {...}}`. A comment with id 0
    /// is new and is appended to the thread before handling.
    pub event: PathBuf,
    /// Proposal the generator answers with (it declines when omitted).
    #[arg(long)]
    pub proposal: Option<PathBuf>,
    /// Commit applied documents with git.
    #[arg(long)]
    pub git: bool,
}

pub fn execute(args: &HandleArgs, ctx: &CliContext) -> anyhow::Result<()> {
    let json = read_text(&args.event)?;
    let mut event: InboundEvent = serde_json::from_str(&json)
        .with_context(|| format!("parsing event {}", args.event.display()))?;

    let repo = LocalRepository::new(&ctx.project_root).with_git(args.git);
    if event.comment.id == 0 {
        event.comment = repo.append_comment(&event.request, event.comment.clone())?;
        tracing::info!(comment_id = event.comment.id, "recorded new comment");
    }

    let generator = match &args.proposal {
        Some(path) => {
            let json = read_text(path)?;
            let proposal: Proposal = serde_json::from_str(&json)
                .with_context(|| format!("parsing proposal {}", path.display()))?;
            ScriptedGenerator::new([GenerationOutcome::Proposal(proposal)])
        }
        None => ScriptedGenerator::default(),
    };

    let cache = ReviewCache::new();
    let mut state = ctx.open_state()?;
    let tracker = LifecycleTracker::new(&repo, &generator, &cache, &ctx.config);
    let outcome = tracker.handle(&mut state, &event)?;

    eprintln!("{}", outcome.describe());
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
