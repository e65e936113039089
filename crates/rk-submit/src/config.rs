//! Bot configuration structures

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::adapter::{Result, SubmitError};

/// Default location of the config file, relative to the repository root.
pub const DEFAULT_CONFIG_PATH: &str = ".rulekeeper/config.toml";

/// Top-level configuration from .rulekeeper/config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub summary: SummaryConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub bot: BotBehaviourConfig,
}

/// Where rule documents live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Directory every proposal target must live under
    #[serde(default = "default_rules_directory")]
    pub directory: String,

    /// File extension of rule documents, without the dot
    #[serde(default = "default_rules_extension")]
    pub extension: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            directory: default_rules_directory(),
            extension: default_rules_extension(),
        }
    }
}

impl RulesConfig {
    /// True when `path` is a rule document path under the rules directory.
    pub fn contains(&self, path: &str) -> bool {
        let directory = self.directory.trim_end_matches('/');
        path.strip_prefix(directory)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| !rest.is_empty() && !rest.split('/').any(|c| c == ".."))
            .unwrap_or(false)
    }

    /// True when `path` has the rule document extension.
    pub fn has_extension(&self, path: &str) -> bool {
        path.rsplit_once('.')
            .map(|(_, ext)| ext == self.extension)
            .unwrap_or(false)
    }
}

/// Summary comment limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Size Guard ceiling in UTF-8 bytes
    #[serde(default = "default_byte_ceiling")]
    pub byte_ceiling: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            byte_ceiling: default_byte_ceiling(),
        }
    }
}

/// Retry policy for collaborator calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Server state storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Storage backend selector: `file://<path>`, `memory://` or a bare path
    #[serde(default = "default_state_url")]
    pub url: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            url: default_state_url(),
        }
    }
}

/// Bot behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotBehaviourConfig {
    /// Literal comment that triggers an apply
    #[serde(default = "default_apply_command")]
    pub apply_command: String,

    /// Number of suggestion records kept in server state
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for BotBehaviourConfig {
    fn default() -> Self {
        Self {
            apply_command: default_apply_command(),
            max_history: default_max_history(),
        }
    }
}

// Serde default functions
fn default_rules_directory() -> String {
    ".cursor/rules".to_string()
}

fn default_rules_extension() -> String {
    "mdc".to_string()
}

fn default_byte_ceiling() -> usize {
    60_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    300_000
}

fn default_state_url() -> String {
    "file://data/server_state.json".to_string()
}

fn default_apply_command() -> String {
    "/apply-cursor-rules".to_string()
}

fn default_max_history() -> usize {
    250
}

impl BotConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BotConfig =
            toml::from_str(&content).map_err(|e| SubmitError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Try to load config, returning default if the file doesn't exist or is invalid
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(SubmitError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.rules.directory.trim().is_empty() {
            return Err(SubmitError::ConfigError(
                "rules.directory must not be empty".to_string(),
            ));
        }
        if self.bot.apply_command.trim().is_empty() {
            return Err(SubmitError::ConfigError(
                "bot.apply_command must not be empty".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SubmitError::ConfigError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
