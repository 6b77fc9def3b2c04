//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/sadash/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/sadash/` (~/.config/sadash/)
//! - Data: `$XDG_DATA_HOME/sadash/` (~/.local/share/sadash/), holds preferences
//! - State/Logs: `$XDG_STATE_HOME/sadash/` (~/.local/state/sadash/)
//!
//! A few settings can be overridden from the environment, which is how the
//! dashboard is usually pointed at a non-production deployment:
//! `SADASH_INDEX_URL`, `SADASH_QUEUE_URL` and `SADASH_CHANNEL`.

use crate::error::{Error, Result};
use crate::types::Channel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Remote service endpoints
    #[serde(default)]
    pub taskcluster: TaskclusterConfig,

    /// Store behaviour
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Index and queue service configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TaskclusterConfig {
    /// Base URL of the index service
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Base URL of the queue service
    #[serde(default = "default_queue_url")]
    pub queue_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for TaskclusterConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            queue_url: default_queue_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_index_url() -> String {
    "https://index.taskcluster.net/v1".to_string()
}

fn default_queue_url() -> String {
    "https://queue.taskcluster.net/v1".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Report aggregation settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DashboardConfig {
    /// Channel used until a preference says otherwise
    #[serde(default)]
    pub default_channel: Channel,

    /// Index namespaces merged into the task collection
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,

    /// Reports fetched concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_channel: Channel::default(),
            namespaces: default_namespaces(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_namespaces() -> Vec<String> {
    vec!["mozreview".to_string(), "phabricator".to_string()]
}

fn default_batch_size() -> usize {
    10
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path, then apply env overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Apply `SADASH_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SADASH_INDEX_URL") {
            self.taskcluster.index_url = url;
        }
        if let Ok(url) = std::env::var("SADASH_QUEUE_URL") {
            self.taskcluster.queue_url = url;
        }
        if let Ok(channel) = std::env::var("SADASH_CHANNEL") {
            self.dashboard.default_channel = channel.parse()?;
        }
        Ok(())
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.taskcluster.index_url.trim().is_empty() {
            return Err(Error::Config("taskcluster.index_url must not be empty".to_string()));
        }
        if self.taskcluster.queue_url.trim().is_empty() {
            return Err(Error::Config("taskcluster.queue_url must not be empty".to_string()));
        }
        if self.dashboard.namespaces.is_empty() {
            return Err(Error::Config(
                "dashboard.namespaces must list at least one namespace".to_string(),
            ));
        }
        if self.dashboard.batch_size == 0 || self.dashboard.batch_size > 100 {
            return Err(Error::Config(
                "dashboard.batch_size must be between 1 and 100".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/sadash/config.toml` (~/.config/sadash/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("sadash").join("config.toml")
    }

    /// Returns the data directory path (for preferences)
    ///
    /// `$XDG_DATA_HOME/sadash/` (~/.local/share/sadash/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("sadash")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/sadash/` (~/.local/state/sadash/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("sadash")
    }
}
