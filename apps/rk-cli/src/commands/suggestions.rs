// suggestions.rs — Recent suggestion records, newest first.

use clap::Args;

use super::CliContext;

#[derive(Args)]
pub struct SuggestionsArgs {
    /// Only records from this repository (`owner/name`).
    #[arg(long)]
    pub repository: Option<String>,
    /// Maximum number of records to show.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: &SuggestionsArgs, ctx: &CliContext) -> anyhow::Result<()> {
    let state = ctx.open_state()?;
    let records = state.state().recent(args.repository.as_deref(), args.limit);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No suggestions recorded.");
        return Ok(());
    }
    println!(
        "{:<38} {:<10} {:<28} {:<40} UPDATED",
        "ID", "STATUS", "REVIEW", "TARGET"
    );
    for record in records {
        println!(
            "{:<38} {:<10} {:<28} {:<40} {}",
            record.id,
            record.status.to_string(),
            format!("{}#{}", record.repository, record.number),
            record.target_path,
            record.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
