// preview.rs — Render the suggestion comment a proposal would get.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use rk_changeset::comment::suggestion::render_suggestion;
use rk_changeset::Proposal;

use super::read_text;

#[derive(Args)]
pub struct PreviewArgs {
    /// Proposal JSON.
    pub proposal: PathBuf,
    /// Current text of the target document, if it exists.
    #[arg(long)]
    pub existing: Option<PathBuf>,
    /// Id of the comment that started the thread.
    #[arg(long, default_value_t = 0)]
    pub thread_root: u64,
}

pub fn execute(args: &PreviewArgs) -> anyhow::Result<()> {
    let json = read_text(&args.proposal)?;
    let proposal: Proposal = serde_json::from_str(&json)
        .with_context(|| format!("parsing {}", args.proposal.display()))?;
    proposal.validate()?;
    let existing = args.existing.as_deref().map(read_text).transpose()?;

    let body = render_suggestion(&proposal, args.thread_root, existing.as_deref())?;
    println!("{}", body);
    Ok(())
}
