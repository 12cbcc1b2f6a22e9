//! Structured logging through `tracing`.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::aideon::tokens::error::{Result, TokenError};

/// Environment variable holding an `EnvFilter` directive; it wins over the
/// configured level.
pub const LOG_ENV: &str = "AIDEON_TOKENS_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error or off
    #[serde(default = "default_level")]
    pub level: String,
    /// text or json
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

/// Installs the global subscriber. Logs go to stderr so that command output
/// on stdout stays machine-readable.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = build_filter(config, verbose)?;
    let registry = Registry::default().with(filter);

    let installed = match config.format.as_str() {
        "json" => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        "text" => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        other => {
            return Err(TokenError::Logging(format!(
                "invalid log format '{other}' (expected 'text' or 'json')"
            )));
        }
    };

    installed.map_err(|err| TokenError::Logging(err.to_string()))
}

fn build_filter(config: &LoggingConfig, verbose: bool) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }

    let level = if verbose { "debug" } else { config.level.as_str() };
    EnvFilter::try_new(level).map_err(|err| TokenError::Logging(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        let config = LoggingConfig {
            level: "info".into(),
            format: "yaml".into(),
        };
        assert!(matches!(init(&config, false), Err(TokenError::Logging(_))));
    }
}
