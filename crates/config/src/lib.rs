//! Configuration loading and default normalization for promptloom.
//!
//! Loads the context-assembly settings from a TOML file with environment
//! variable overrides. Invalid (zero) values never fail: they are replaced
//! with the documented defaults by [`ContextConfig::normalized`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_TURNS: usize = 10;
pub const DEFAULT_MAX_EPISODES: usize = 3;
pub const DEFAULT_MAX_TOKENS: usize = 4096;
pub const DEFAULT_RECENT_TURNS: usize = 3;
pub const DEFAULT_MAX_RETRIEVAL_ITEMS: usize = 5;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Settings for the context assembly service.
///
/// Maps directly to `~/.promptloom/config.toml`:
///
/// ```toml
/// max_turns = 10
/// max_episodes = 3
/// max_tokens = 4096
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Max conversation turns fetched per build
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Max episodic memories fetched per build
    #[serde(default = "default_max_episodes")]
    pub max_episodes: usize,

    /// Token budget used when a request does not set one
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// How many trailing turns count as "recent"
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    /// Max retrieval items rendered into the retrieval segment
    #[serde(default = "default_max_retrieval_items")]
    pub max_retrieval_items: usize,

    /// TTL for memoized preference lookups, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}
fn default_max_episodes() -> usize {
    DEFAULT_MAX_EPISODES
}
fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}
fn default_recent_turns() -> usize {
    DEFAULT_RECENT_TURNS
}
fn default_max_retrieval_items() -> usize {
    DEFAULT_MAX_RETRIEVAL_ITEMS
}
fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_episodes: default_max_episodes(),
            max_tokens: default_max_tokens(),
            recent_turns: default_recent_turns(),
            max_retrieval_items: default_max_retrieval_items(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl ContextConfig {
    /// Load configuration from the default path (`~/.promptloom/config.toml`)
    /// and apply environment overrides:
    /// - `PROMPTLOOM_MAX_TURNS`
    /// - `PROMPTLOOM_MAX_EPISODES`
    /// - `PROMPTLOOM_MAX_TOKENS`
    /// - `PROMPTLOOM_CACHE_TTL_SECS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config.normalized())
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults are returned instead.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config.normalized())
    }

    /// Apply overrides from an environment-like lookup.
    ///
    /// Values that do not parse are ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(&lookup, "PROMPTLOOM_MAX_TURNS", &mut self.max_turns);
        override_from(&lookup, "PROMPTLOOM_MAX_EPISODES", &mut self.max_episodes);
        override_from(&lookup, "PROMPTLOOM_MAX_TOKENS", &mut self.max_tokens);
        override_from(&lookup, "PROMPTLOOM_CACHE_TTL_SECS", &mut self.cache_ttl_secs);
    }

    /// Replace every zero setting with its default.
    pub fn normalized(mut self) -> Self {
        if self.max_turns == 0 {
            self.max_turns = DEFAULT_MAX_TURNS;
        }
        if self.max_episodes == 0 {
            self.max_episodes = DEFAULT_MAX_EPISODES;
        }
        if self.max_tokens == 0 {
            self.max_tokens = DEFAULT_MAX_TOKENS;
        }
        if self.recent_turns == 0 {
            self.recent_turns = DEFAULT_RECENT_TURNS;
        }
        if self.max_retrieval_items == 0 {
            self.max_retrieval_items = DEFAULT_MAX_RETRIEVAL_ITEMS;
        }
        if self.cache_ttl_secs == 0 {
            self.cache_ttl_secs = DEFAULT_CACHE_TTL_SECS;
        }
        self
    }

    /// Cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".promptloom")
    }

    /// Render the default configuration as TOML.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn override_from<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable config override"),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },
}
