// mode.rs — Show or change the server mode.

use clap::Args;

use super::CliContext;

#[derive(Args)]
pub struct ModeArgs {
    /// Simulate: record suggestions without posting, accepting or committing.
    #[arg(long)]
    pub dry_run: Option<bool>,
    /// Acknowledge every event without processing it.
    #[arg(long)]
    pub disabled: Option<bool>,
}

pub fn execute(args: &ModeArgs, ctx: &CliContext) -> anyhow::Result<()> {
    let mut state = ctx.open_state()?;
    let mode = if args.dry_run.is_some() || args.disabled.is_some() {
        state.set_mode(args.dry_run, args.disabled)?
    } else {
        state.mode().clone()
    };
    println!("{}", serde_json::to_string_pretty(&mode)?);
    Ok(())
}
