//! Station configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/groundlink/station.toml`
//! - Windows: `%APPDATA%/groundlink/station.toml`
//!
//! The path can be overridden with the first command-line argument or the
//! `GROUNDLINK_CONFIG` environment variable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV: &str = "GROUNDLINK_CONFIG";

/// Station configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    /// Station name (hostname by default), attached to stored points.
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of recent rows kept in memory.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Column names of the incoming feed, in field order.
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Where the delimited telemetry feed is read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// File, FIFO or serial device path; `-` reads standard input.
    #[serde(default = "default_stdio")]
    pub path: String,

    /// Field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

/// Persistent store export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Line-protocol output file; `-` writes to standard output.
    #[serde(default = "default_stdio")]
    pub output: String,

    #[serde(default = "default_measurement")]
    pub measurement: String,

    #[serde(default = "default_store_interval")]
    pub interval_ms: u64,
}

/// Live dashboard export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSON snapshot document, replaced on every publish.
    #[serde(default = "default_dashboard_output")]
    pub output: String,

    /// Columns to publish; empty publishes all of them.
    #[serde(default)]
    pub columns: Vec<String>,

    #[serde(default = "default_dashboard_interval")]
    pub interval_ms: u64,
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "groundlink".into())
}

fn default_capacity() -> usize {
    1000
}

fn default_columns() -> Vec<String> {
    vec!["time".into(), "altitude".into(), "velocity".into()]
}

fn default_stdio() -> String {
    "-".into()
}

fn default_delimiter() -> char {
    ','
}

fn default_true() -> bool {
    true
}

fn default_measurement() -> String {
    "telemetry".into()
}

fn default_store_interval() -> u64 {
    1000
}

fn default_dashboard_output() -> String {
    "groundlink-dashboard.json".into()
}

fn default_dashboard_interval() -> u64 {
    250
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            capacity: default_capacity(),
            columns: default_columns(),
            source: SourceConfig::default(),
            store: StoreConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_stdio(),
            delimiter: default_delimiter(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output: default_stdio(),
            measurement: default_measurement(),
            interval_ms: default_store_interval(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output: default_dashboard_output(),
            columns: Vec::new(),
            interval_ms: default_dashboard_interval(),
        }
    }
}

impl StationConfig {
    /// Loads configuration from `path`, or writes and returns the defaults
    /// if the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: StationConfig = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = StationConfig::default();
            config.save(path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Resolves the configuration path: explicit argument, then
/// [`CONFIG_ENV`], then the platform default.
pub fn config_path(arg: Option<String>) -> PathBuf {
    if let Some(path) = arg {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    default_config_path()
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("groundlink").join("station.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("groundlink")
            .join("station.toml")
    }
}
