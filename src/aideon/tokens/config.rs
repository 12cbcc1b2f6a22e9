//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `AIDEON_TOKENS__SECTION__KEY` environment variables.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aideon::tokens::error::Result;
use crate::aideon::tokens::logging::LoggingConfig;

/// Configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "aideon-tokens.toml";
/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "AIDEON_TOKENS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokensConfig {
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub themes: ThemeRules,
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            backup: BackupConfig::default(),
            themes: ThemeRules::default(),
            watch: WatchSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Backup root; relative paths are resolved against the working directory.
    #[serde(default = "default_backup_root")]
    pub root: PathBuf,
    /// Backups kept per operation type.
    #[serde(default = "default_retention")]
    pub retention: usize,
    /// Refuse rollbacks over uncommitted changes unless forced.
    #[serde(default = "default_true")]
    pub check_uncommitted: bool,
}

fn default_backup_root() -> PathBuf {
    PathBuf::from(".token-backups")
}

fn default_retention() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            root: default_backup_root(),
            retention: default_retention(),
            check_uncommitted: default_true(),
        }
    }
}

impl BackupConfig {
    pub fn resolve_root(&self, base: &Path) -> PathBuf {
        if self.root.is_absolute() {
            self.root.clone()
        } else {
            base.join(&self.root)
        }
    }
}

/// Sets every theme is expected to wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeRules {
    /// Set each theme should use as `source`.
    #[serde(default = "default_required_set")]
    pub required_set: String,
    /// Set each theme should have `enabled`.
    #[serde(default = "default_recommended_set")]
    pub recommended_set: String,
}

fn default_required_set() -> String {
    "core".to_string()
}

fn default_recommended_set() -> String {
    "global".to_string()
}

impl Default for ThemeRules {
    fn default() -> Self {
        Self {
            required_set: default_required_set(),
            recommended_set: default_recommended_set(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

fn builder_with_defaults() -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("backup.root", ".token-backups")?
        .set_default("backup.retention", 10)?
        .set_default("backup.check_uncommitted", true)?
        .set_default("themes.required_set", "core")?
        .set_default("themes.recommended_set", "global")?
        .set_default("watch.interval_ms", 1000)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")
}

/// Loads the configuration. An explicit file must exist; otherwise
/// `aideon-tokens.toml` in `workspace` is used when present.
pub fn load(explicit: Option<&Path>, workspace: &Path) -> Result<TokensConfig> {
    let mut builder = builder_with_defaults()?;

    match explicit {
        Some(path) => {
            debug!(config = %path.display(), "using explicit configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }
        None => {
            let candidate = workspace.join(CONFIG_FILE);
            if candidate.exists() {
                debug!(config = %candidate.display(), "using workspace configuration file");
                builder = builder.add_source(File::from(candidate.as_path()).required(false));
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    Ok(builder.build()?.try_deserialize()?)
}
