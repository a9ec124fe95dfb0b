//! TOML-based configuration for hunkmerge.
//!
//! Every section is optional; a missing file yields the defaults via
//! [`AppConfig::load_or_default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conflict::parser::{ConflictParser, ParseMode};
use crate::errors::ConfigError;
use crate::git::CommitAuthor;

/// Environment variable that overrides `parser.mode`.
pub const PARSER_MODE_ENV: &str = "HUNKMERGE_PARSER_MODE";

/// Placeholder substituted with the merge source in `merge.message_template`.
const SOURCE_PLACEHOLDER: &str = "{source}";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Conflict-marker parsing settings.
    #[serde(default)]
    pub parser: ParserConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Merge commit settings.
    #[serde(default)]
    pub merge: MergeConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    /// `lenient` (default) or `strict`.
    #[serde(default)]
    pub mode: ParseMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Merge commit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Commit message template; `{source}` is replaced by the merge source.
    #[serde(default = "default_message_template")]
    pub message_template: String,

    /// Used for `{source}` when the session has no merge source.
    #[serde(default = "default_fallback_source")]
    pub fallback_source: String,

    /// Merge commit author name. Defaults to the repository signature.
    #[serde(default)]
    pub author_name: Option<String>,

    /// Merge commit author email.
    #[serde(default)]
    pub author_email: Option<String>,
}

fn default_message_template() -> String {
    SOURCE_PLACEHOLDER.into()
}
fn default_fallback_source() -> String {
    "Merge incoming changes".into()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            message_template: default_message_template(),
            fallback_source: default_fallback_source(),
            author_name: None,
            author_email: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Default location: `<config dir>/hunkmerge/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hunkmerge").join("config.toml"))
    }

    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load_from_file(path) {
            Err(ConfigError::FileNotFound(p)) => {
                debug!(path = %p, "no configuration file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        match std::env::var(PARSER_MODE_ENV) {
            Ok(val) if !val.is_empty() => {
                self.parser.mode = val.parse().map_err(|detail| ConfigError::InvalidValue {
                    field: PARSER_MODE_ENV.into(),
                    detail,
                })?;
                debug!(mode = %self.parser.mode, "parser mode overridden from environment");
            }
            Ok(_) => warn!(env_name = PARSER_MODE_ENV, "env var is set but empty"),
            Err(_) => {}
        }
        Ok(())
    }

    /// Validate that all fields are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merge.message_template.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "merge.message_template".into(),
                detail: "merge message template must not be empty".into(),
            });
        }
        if self.merge.author_name.is_some() != self.merge.author_email.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "merge.author_email".into(),
                detail: "author_name and author_email must be set together".into(),
            });
        }
        if parse_level(&self.logging.level).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: format!("unknown log level '{}'", self.logging.level),
            });
        }
        Ok(())
    }

    /// Convenience: load (or default), apply overrides, and validate.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parser configured with `parser.mode`.
    pub fn parser(&self) -> ConflictParser {
        ConflictParser::new(self.parser.mode)
    }

    /// Explicit merge commit identity, if configured.
    pub fn commit_author(&self) -> Option<CommitAuthor> {
        match (&self.merge.author_name, &self.merge.author_email) {
            (Some(name), Some(email)) => Some(CommitAuthor {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        }
    }

    /// Render the merge commit message for `merge_source`.
    pub fn commit_message(&self, merge_source: Option<&str>) -> String {
        let source = merge_source.unwrap_or(&self.merge.fallback_source);
        self.merge.message_template.replace(SOURCE_PLACEHOLDER, source)
    }
}

/// Accepts the level names understood by `tracing`.
fn parse_level(level: &str) -> Option<tracing::Level> {
    level.parse().ok()
}
