//! core::config
//!
//! Per-run configuration.
//!
//! # Overview
//!
//! refsync keeps no configuration file. Every run resolves its settings
//! from three layers, later layers overriding earlier ones:
//!
//! 1. Default values
//! 2. Environment (`REFSYNC_REMOTE`, `REFSYNC_ASSUME_YES`)
//! 3. CLI flags
//!
//! The remote name has one extra fallback between the defaults and the
//! environment: the repository's own default remote (see
//! [`Config::remote_or`]).
//!
//! # Example
//!
//! ```
//! use refsync::core::config::{Config, ConfigOverrides};
//!
//! let overrides = ConfigOverrides {
//!     remote: Some("upstream".to_string()),
//!     assume_yes: false,
//! };
//! let config = Config::resolve_with(&overrides, |_| None).unwrap();
//! assert_eq!(config.remote_or(Some("origin".to_string())), "upstream");
//! assert!(!config.assume_yes());
//! ```

use thiserror::Error;

/// Remote used when neither flags, environment nor the repository name one.
pub const DEFAULT_REMOTE: &str = "origin";

/// Environment variable naming the remote to sync with.
pub const ENV_REMOTE: &str = "REFSYNC_REMOTE";

/// Environment variable that answers ordinary confirmations with "yes".
pub const ENV_ASSUME_YES: &str = "REFSYNC_ASSUME_YES";

/// Errors from configuration resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Settings supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `--remote <name>`
    pub remote: Option<String>,
    /// `--yes`
    pub assume_yes: bool,
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone, Default)]
pub struct Config {
    remote: Option<String>,
    assume_yes: bool,
}

impl Config {
    /// Resolve configuration from the process environment and CLI flags.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn resolve_with(
        overrides: &ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(remote) = env(ENV_REMOTE).filter(|r| !r.trim().is_empty()) {
            config.remote = Some(validate_remote(ENV_REMOTE, remote.trim())?);
        }
        if let Some(raw) = env(ENV_ASSUME_YES) {
            config.assume_yes = parse_bool(ENV_ASSUME_YES, &raw)?;
        }

        if let Some(remote) = &overrides.remote {
            config.remote = Some(validate_remote("--remote", remote)?);
        }
        if overrides.assume_yes {
            config.assume_yes = true;
        }

        Ok(config)
    }

    /// The remote to work against.
    ///
    /// Explicit settings win; otherwise `repo_default` (the repository's
    /// preferred remote), otherwise [`DEFAULT_REMOTE`].
    pub fn remote_or(&self, repo_default: Option<String>) -> String {
        self.remote
            .clone()
            .or(repo_default)
            .unwrap_or_else(|| DEFAULT_REMOTE.to_string())
    }

    /// Whether ordinary yes/no confirmations are answered automatically.
    pub fn assume_yes(&self) -> bool {
        self.assume_yes
    }
}

fn validate_remote(key: &str, remote: &str) -> Result<String, ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    };

    if remote.is_empty() {
        return Err(invalid("remote name cannot be empty"));
    }
    if remote.starts_with('-') {
        return Err(invalid("remote name cannot start with '-'"));
    }
    if remote.chars().any(|c| c.is_whitespace() || c.is_ascii_control()) {
        return Err(invalid("remote name cannot contain whitespace"));
    }
    Ok(remote.to_string())
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
