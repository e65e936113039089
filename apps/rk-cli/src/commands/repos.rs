// repos.rs — Connected repositories.

use clap::Args;

use super::CliContext;

#[derive(Args)]
pub struct ReposArgs {
    /// Enable events for this repository (`owner/name`).
    #[arg(long, conflicts_with = "disable")]
    pub enable: Option<String>,
    /// Ignore events for this repository (`owner/name`).
    #[arg(long)]
    pub disable: Option<String>,
}

pub fn execute(args: &ReposArgs, ctx: &CliContext) -> anyhow::Result<()> {
    let mut state = ctx.open_state()?;

    let change = match (&args.enable, &args.disable) {
        (Some(name), _) => Some((name, true)),
        (_, Some(name)) => Some((name, false)),
        _ => None,
    };
    if let Some((name, enabled)) = change {
        let known = state.update(|s| Ok(s.set_repository_enabled(name, enabled)))?;
        if !known {
            anyhow::bail!("repository {} has not sent any events yet", name);
        }
    }

    let repositories = &state.state().repositories;
    if repositories.is_empty() {
        println!("No connected repositories.");
        return Ok(());
    }
    println!("{:<40} {:<8} {:<14} LAST ACTIVE", "REPOSITORY", "ENABLED", "INSTALLATION");
    for repo in repositories.values() {
        println!(
            "{:<40} {:<8} {:<14} {}",
            repo.full_name,
            repo.enabled,
            repo.installation_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            repo.last_active.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
