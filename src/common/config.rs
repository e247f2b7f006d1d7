//! Configuration file handling

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Execution service endpoints
    #[serde(default)]
    pub service: ServiceConfig,

    /// Progress polling settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Session behaviour
    #[serde(default)]
    pub session: SessionSettings,

    /// Per-language profile overrides, keyed by language name
    #[serde(default)]
    pub languages: HashMap<String, LanguageOverride>,
}

/// Execution service endpoints
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Base URL every path is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Batch submission endpoint (POST)
    #[serde(default = "default_execute_path")]
    pub execute_path: String,

    /// Progress endpoint (GET)
    #[serde(default = "default_status_path")]
    pub status_path: String,

    /// Available versions/compilers endpoint (GET)
    #[serde(default = "default_languages_path")]
    pub languages_path: String,

    /// Upper bound for a whole submission round-trip
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            execute_path: default_execute_path(),
            status_path: default_status_path(),
            languages_path: default_languages_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServiceConfig {
    /// Join an endpoint path onto the base URL
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:5000/api/v1".to_string()
}
fn default_execute_path() -> String {
    "execute_code".to_string()
}
fn default_status_path() -> String {
    "status_execution".to_string()
}
fn default_languages_path() -> String {
    "versions_compilers".to_string()
}
fn default_request_timeout() -> u64 {
    600
}

/// Progress polling settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PollingConfig {
    /// Delay between status samples
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

fn default_poll_interval() -> u64 {
    200
}

/// What to do with test-file lines that appear before any section header
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreHeaderPolicy {
    /// Skip them with a warning
    #[default]
    Drop,
    /// Fail the whole file
    Reject,
}

/// What to do with a cell that has no committed settings at request time
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingEntryPolicy {
    /// Leave the cell out of the batch and report it
    #[default]
    Skip,
    /// Refuse to build the batch
    Abort,
}

/// Session behaviour
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionSettings {
    /// Cells a fresh session starts with
    #[serde(default = "default_initial_cells")]
    pub initial_cells: usize,

    /// Removal below this count is refused
    #[serde(default = "default_min_cells")]
    pub min_cells: usize,

    #[serde(default)]
    pub pre_header_lines: PreHeaderPolicy,

    #[serde(default)]
    pub missing_entries: MissingEntryPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            initial_cells: default_initial_cells(),
            min_cells: default_min_cells(),
            pre_header_lines: PreHeaderPolicy::default(),
            missing_entries: MissingEntryPolicy::default(),
        }
    }
}

fn default_initial_cells() -> usize {
    2
}
fn default_min_cells() -> usize {
    2
}

/// Override or extension of a built-in language profile
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LanguageOverride {
    #[serde(default)]
    pub default_version: Option<String>,
    #[serde(default)]
    pub default_compiler: Option<String>,
    #[serde(default)]
    pub versions: Option<Vec<String>>,
    #[serde(default)]
    pub compilers: Option<Vec<String>>,
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| super::Error::Config(e.to_string()))
    }
}
