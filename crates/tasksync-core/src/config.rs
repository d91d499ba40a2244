use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CachePolicy;
use crate::mutation::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token. Usually supplied through `TASKSYNC_TOKEN` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            token: None,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
    #[serde(default)]
    pub mutation_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: default_search_debounce_ms(),
            retention_secs: default_retention_secs(),
            stale_after_secs: None,
            mutation_retries: 0,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    #[must_use]
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            retention: Duration::from_secs(self.retention_secs),
            stale_after: self.stale_after_secs.map(Duration::from_secs),
        }
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.mutation_retries,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// `<config_dir>/tasksync/config.toml`, when the platform has a config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tasksync/config.toml"))
}

/// Load `path`; a missing file yields defaults.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the user's config file and apply environment overrides.
///
/// # Errors
///
/// See [`load_config`], plus malformed override values.
pub fn load_user_config() -> Result<UserConfig> {
    let mut config = match default_config_path() {
        Some(path) => load_config(&path)?,
        None => UserConfig::default(),
    };
    apply_env_overrides(&mut config, |name| env::var(name).ok())?;
    Ok(config)
}

/// Apply `TASKSYNC_BASE_URL`, `TASKSYNC_TOKEN` and `TASKSYNC_TIMEOUT_SECS`
/// as read through `lookup`.
///
/// # Errors
///
/// Fails when `TASKSYNC_TIMEOUT_SECS` is not a whole number of seconds.
pub fn apply_env_overrides(
    config: &mut UserConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(url) = lookup("TASKSYNC_BASE_URL").filter(|v| !v.trim().is_empty()) {
        config.client.base_url = url.trim().to_string();
    }
    if let Some(token) = lookup("TASKSYNC_TOKEN").filter(|v| !v.trim().is_empty()) {
        config.client.token = Some(token.trim().to_string());
    }
    if let Some(raw) = lookup("TASKSYNC_TIMEOUT_SECS") {
        config.client.timeout_secs = raw
            .trim()
            .parse()
            .with_context(|| format!("TASKSYNC_TIMEOUT_SECS must be seconds, got '{raw}'"))?;
    }
    Ok(())
}

/// Pick the output mode: explicit flag, then `FORMAT`, then the config
/// file, then pretty on a terminal and text otherwise.
#[must_use]
pub fn resolve_output(
    cli_format: Option<&str>,
    user_output: Option<&str>,
    env_format: Option<&str>,
) -> &'static str {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    [cli_format, env_format, user_output]
        .into_iter()
        .flatten()
        .find_map(normalize_output_mode)
        .unwrap_or_else(|| {
            if std::io::stdout().is_terminal() {
                "pretty"
            } else {
                "text"
            }
        })
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_search_debounce_ms() -> u64 {
    500
}

const fn default_retention_secs() -> u64 {
    60
}
