//! Configuration file handling.
//!
//! Settings are read from a TOML file (by default
//! `~/.config/trawl/config.toml`). Every field has a default, so a partial
//! or missing file is fine. API keys may also come from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TrawlError};

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/trawl/config.toml";
pub const VIRUSTOTAL_KEY_ENV: &str = "VIRUSTOTAL_API_KEY";
pub const SAFE_BROWSING_KEY_ENV: &str = "GOOGLE_SAFE_BROWSING_API_KEY";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub checkers: CheckersConfig,

    #[serde(default)]
    pub reports: ReportsConfig,

    #[serde(default)]
    pub intel: IntelConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub registry: RegistryConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the API listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}

/// Settings shared by every checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckersConfig {
    /// Upper bound for a single checker call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent sent by the network probes.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CheckersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    trawl_probes::DEFAULT_USER_AGENT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Reports needed before a URL counts as blacklisted.
    #[serde(default = "default_blacklist_threshold")]
    pub blacklist_threshold: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            blacklist_threshold: default_blacklist_threshold(),
        }
    }
}

fn default_blacklist_threshold() -> usize {
    crate::reports::DEFAULT_BLACKLIST_THRESHOLD
}

/// External threat intelligence keys. A source without a key is skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virustotal_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_browsing_api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// A registry match keeps its SAFE verdict even when later checkers
    /// report danger; they only add warnings.
    #[serde(default = "default_true")]
    pub registry_is_final: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            registry_is_final: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Where official domains come from. The built-in table is used when unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RegistryConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(expand_path)
    }
}

/// Expand a leading `~` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

pub fn default_config_path() -> PathBuf {
    expand_path(DEFAULT_CONFIG_PATH)
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrawlError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            TrawlError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing default file yields the defaults. A missing explicit file is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Fill API keys from the environment. Set variables take precedence over the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(VIRUSTOTAL_KEY_ENV) {
            self.intel.virustotal_api_key = Some(key);
        }
        if let Some(key) = non_empty(SAFE_BROWSING_KEY_ENV) {
            self.intel.safe_browsing_api_key = Some(key);
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.checkers.timeout_secs, 10);
        assert_eq!(config.reports.blacklist_threshold, 3);
        assert!(config.policy.registry_is_final);
        assert!(config.intel.virustotal_api_key.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
[server]
bind = "0.0.0.0:8080"

[reports]
blacklist_threshold = 5

[policy]
registry_is_final = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.reports.blacklist_threshold, 5);
        assert!(!config.policy.registry_is_final);
        assert_eq!(config.checkers.timeout_secs, 10);
    }

    #[test]
    fn test_env_overrides_keys() {
        let mut config = Config::default();
        config.intel.safe_browsing_api_key = Some("from-file".to_string());

        config.apply_env(|name| match name {
            VIRUSTOTAL_KEY_ENV => Some("vt-from-env".to_string()),
            SAFE_BROWSING_KEY_ENV => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(
            config.intel.virustotal_api_key.as_deref(),
            Some("vt-from-env")
        );
        assert_eq!(
            config.intel.safe_browsing_api_key.as_deref(),
            Some("from-file")
        );
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[checkers]"));
        assert!(toml_str.contains("registry_is_final = true"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
