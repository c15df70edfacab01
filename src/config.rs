use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub intel: IntelConfig,

    #[serde(default)]
    pub firewall: FirewallConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub simulate: SimulateConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or fall back to defaults
    pub fn load_or_default() -> Result<Self> {
        for path in Self::search_paths() {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/sn1tch/config.toml")];
        if let Some(dir) = dirs_next::config_dir() {
            paths.push(dir.join("sn1tch/config.toml"));
        }
        paths.push(PathBuf::from("data/config.toml"));
        paths.push(PathBuf::from("config.toml"));
        paths
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.data_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.data_dir().join("output.json")
    }

    /// Blocked-list file; relative paths live under the data directory
    pub fn blocked_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.firewall.blocked_file);
        if path.is_absolute() {
            path
        } else {
            self.data_dir().join(path)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.general.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Failures from one address before it is reported
    #[serde(default = "default_threshold")]
    pub threshold: u64,

    /// Live mode wait between checks for appended lines
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Directory holding output.json and the blocked list
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelConfig {
    /// GeoIP endpoint; the address is appended as the last path segment
    #[serde(default = "default_geo_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_geo_timeout")]
    pub timeout_secs: u64,
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geo_endpoint(),
            timeout_secs: default_geo_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallConfig {
    /// Command and leading args; the address is appended last
    #[serde(default = "default_block_command")]
    pub command: Vec<String>,

    /// Append-only record of blocked addresses
    #[serde(default = "default_blocked_file")]
    pub blocked_file: String,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            command: default_block_command(),
            blocked_file: default_blocked_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Discord webhook URL (empty or absent disables delivery)
    #[serde(default)]
    pub discord_webhook: Option<String>,

    /// Countries whose addresses are reported but never blocked or notified
    #[serde(default)]
    pub ignore_countries: Vec<String>,

    /// Webhook request timeout in seconds
    #[serde(default = "default_alert_timeout")]
    pub timeout_secs: u64,

    /// Embed footer text
    #[serde(default = "default_footer")]
    pub footer: String,
}

impl AlertsConfig {
    /// Configured webhook, ignoring blank values
    pub fn webhook(&self) -> Option<&str> {
        self.discord_webhook
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            discord_webhook: None,
            ignore_countries: Vec::new(),
            timeout_secs: default_alert_timeout(),
            footer: default_footer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateConfig {
    /// Seconds between fabricated lines while simulating
    #[serde(default = "default_simulate_interval")]
    pub interval_secs: u64,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_simulate_interval(),
        }
    }
}

// Default value functions
fn default_threshold() -> u64 {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_geo_endpoint() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_geo_timeout() -> u64 {
    2
}

fn default_block_command() -> Vec<String> {
    ["sudo", "ufw", "deny", "from"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_blocked_file() -> String {
    "blocked.txt".to_string()
}

fn default_alert_timeout() -> u64 {
    5
}

fn default_footer() -> String {
    format!("sN1TCH v{}", env!("CARGO_PKG_VERSION"))
}

fn default_simulate_interval() -> u64 {
    2
}
