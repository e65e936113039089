//! # rk-cli
//!
//! Command-line interface for rulekeeper.
//!
//! - `rulekeeper merge` — fold proposals into a rule document
//! - `rulekeeper diff` — show what changed between two rule documents
//! - `rulekeeper preview` — render the suggestion comment for a proposal
//! - `rulekeeper handle` — run one comment event through the lifecycle
//! - `rulekeeper mode` / `repos` / `suggestions` — inspect and update server state

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::CliContext;

/// rulekeeper — turn review feedback into rule document changes.
#[derive(Parser)]
#[command(name = "rulekeeper", version, about)]
struct Cli {
    /// Repository working tree (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Config file (defaults to .rulekeeper/config.toml under the project root).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge proposals into a document and print the result.
    Merge(commands::merge::MergeArgs),
    /// Print the diff between two rule documents.
    Diff(commands::diff::DiffArgs),
    /// Print the suggestion comment for a proposal.
    Preview(commands::preview::PreviewArgs),
    /// Handle one comment event against the working tree.
    Handle(commands::handle::HandleArgs),
    /// Show or change the server mode.
    Mode(commands::mode::ModeArgs),
    /// List connected repositories, or enable/disable one.
    Repos(commands::repos::ReposArgs),
    /// List recent suggestion records.
    Suggestions(commands::suggestions::SuggestionsArgs),
}

fn init_logging(json: bool) -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    let filter = EnvFilter::from_default_env()
        .add_directive("rk_lifecycle=info".parse()?)
        .add_directive("rk_changeset=info".parse()?)
        .add_directive("rk_submit=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;

    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let ctx = CliContext::load(project_root, cli.config.as_deref());

    match &cli.command {
        Commands::Merge(args) => commands::merge::execute(args),
        Commands::Diff(args) => commands::diff::execute(args),
        Commands::Preview(args) => commands::preview::execute(args),
        Commands::Handle(args) => commands::handle::execute(args, &ctx),
        Commands::Mode(args) => commands::mode::execute(args, &ctx),
        Commands::Repos(args) => commands::repos::execute(args, &ctx),
        Commands::Suggestions(args) => commands::suggestions::execute(args, &ctx),
    }
}
