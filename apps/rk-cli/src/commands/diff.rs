// diff.rs — Show the diff between two rule documents.

use std::path::PathBuf;

use clap::Args;
use rk_changeset::DocumentDiff;

use super::read_text;

#[derive(Args)]
pub struct DiffArgs {
    /// Original document.
    pub old: PathBuf,
    /// Changed document.
    pub new: PathBuf,
    /// Lines of unchanged context around each change (all lines when omitted).
    #[arg(long)]
    pub context: Option<usize>,
}

pub fn execute(args: &DiffArgs) -> anyhow::Result<()> {
    let old = read_text(&args.old)?;
    let new = read_text(&args.new)?;
    let diff = DocumentDiff::between(&old, &new);
    if diff.is_empty() {
        eprintln!("No changes.");
        return Ok(());
    }
    for line in diff.render(args.context) {
        println!("{}", line);
    }
    Ok(())
}
