// mod.rs — Subcommands and the context they share.

pub mod diff;
pub mod handle;
pub mod merge;
pub mod mode;
pub mod preview;
pub mod repos;
pub mod suggestions;

use std::path::{Path, PathBuf};

use anyhow::Context;
use rk_lifecycle::StateManager;
use rk_submit::config::DEFAULT_CONFIG_PATH;
use rk_submit::BotConfig;

/// Project root plus its loaded configuration.
pub struct CliContext {
    pub project_root: PathBuf,
    pub config: BotConfig,
}

impl CliContext {
    pub fn load(project_root: PathBuf, config_path: Option<&Path>) -> Self {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_root.join(DEFAULT_CONFIG_PATH));
        let config = BotConfig::load_or_default(&path);
        Self {
            project_root,
            config,
        }
    }

    /// The state storage URL with relative file paths anchored at the
    /// project root.
    pub fn state_url(&self) -> String {
        let url = self.config.state.url.trim();
        if url.starts_with("memory://") {
            return url.to_string();
        }
        if url.contains("://") && !url.starts_with("file://") {
            return url.to_string();
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        if path.is_empty() || Path::new(path).is_absolute() {
            return url.to_string();
        }
        format!("file://{}", self.project_root.join(path).display())
    }

    pub fn open_state(&self) -> anyhow::Result<StateManager> {
        let url = self.state_url();
        let manager = StateManager::from_url(&url)
            .with_context(|| format!("opening server state at {}", url))?;
        Ok(manager.with_max_history(self.config.bot.max_history))
    }
}

/// Read a text file with the path in the error.
pub fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(url: &str) -> CliContext {
        let mut config = BotConfig::default();
        config.state.url = url.to_string();
        CliContext {
            project_root: PathBuf::from("/work/repo"),
            config,
        }
    }

    #[test]
    fn relative_state_paths_are_anchored_at_the_project_root() {
        assert_eq!(
            ctx("file://data/state.json").state_url(),
            "file:///work/repo/data/state.json"
        );
        assert_eq!(ctx("data/state.json").state_url(), "file:///work/repo/data/state.json");
        assert_eq!(ctx("file:///abs/state.json").state_url(), "file:///abs/state.json");
        assert_eq!(ctx("memory://").state_url(), "memory://");
        assert_eq!(ctx("s3://bucket").state_url(), "s3://bucket");
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CliContext::load(dir.path().to_path_buf(), None);
        assert_eq!(ctx.config, BotConfig::default());
    }
}
