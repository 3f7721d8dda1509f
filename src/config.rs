//! Project configuration for the hub
//!
//! Configuration is stored in `<hub dir>/config.toml` and controls where the
//! shared document lives, how much status history is kept, which identities
//! act for the lock manager and the integration desk, and dashboard/logging
//! defaults. A missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Shared document location
    #[serde(default)]
    pub store: StoreConfig,

    /// Hub behavior
    #[serde(default)]
    pub hub: HubConfig,

    /// Terminal dashboard settings
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Logging defaults (RUST_LOG still wins)
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// File name of the shared document, relative to the hub directory
    #[serde(default = "default_store_file")]
    pub file: String,
}

fn default_store_file() -> String {
    "hub.json".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file: default_store_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Number of status updates kept in the ring buffer
    #[serde(default = "default_status_history")]
    pub status_history: usize,

    /// Identity that signs lock approvals and denials
    #[serde(default = "default_lock_manager")]
    pub lock_manager: String,

    /// Identity that receives conflict reports and interface announcements
    #[serde(default = "default_integration_agent")]
    pub integration_agent: String,
}

fn default_status_history() -> usize {
    50
}

fn default_lock_manager() -> String {
    "File Lock Manager".to_string()
}

fn default_integration_agent() -> String {
    "integration_agent".to_string()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            status_history: default_status_history(),
            lock_manager: default_lock_manager(),
            integration_agent: default_integration_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Poll interval for `hub watch`, in milliseconds
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,

    /// Number of recent messages shown
    #[serde(default = "default_recent_messages")]
    pub recent_messages: usize,
}

fn default_refresh_ms() -> u64 {
    2000
}

fn default_recent_messages() -> usize {
    20
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
            recent_messages: default_recent_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive used when RUST_LOG is unset (e.g. "info", "agenthub=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from `<hub dir>/config.toml`
    /// Returns default config if file doesn't exist
    pub fn load(hub_dir: &Path) -> anyhow::Result<Self> {
        let config_path = hub_dir.join("config.toml");

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config: {}", e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Save configuration to `<hub dir>/config.toml`
    pub fn save(&self, hub_dir: &Path) -> anyhow::Result<()> {
        let config_path = hub_dir.join("config.toml");

        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;

        fs::write(&config_path, content)
            .map_err(|e| anyhow::anyhow!("Failed to write config: {}", e))?;

        Ok(())
    }

    /// Initialize default config file if it doesn't exist
    pub fn init(hub_dir: &Path) -> anyhow::Result<bool> {
        let config_path = hub_dir.join("config.toml");

        if config_path.exists() {
            return Ok(false);
        }

        let config = Self::default();
        config.save(hub_dir)?;
        Ok(true)
    }

    /// Absolute path of the shared document
    pub fn store_path(&self, hub_dir: &Path) -> PathBuf {
        hub_dir.join(&self.store.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.file, "hub.json");
        assert_eq!(config.hub.status_history, 50);
        assert_eq!(config.hub.lock_manager, "File Lock Manager");
        assert_eq!(config.dashboard.refresh_ms, 2000);
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(temp_dir.path()).unwrap();
        assert_eq!(config.hub.status_history, 50);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.hub.status_history = 10;
        config.log.level = "debug".to_string();

        config.save(temp_dir.path()).unwrap();
        let loaded = Config::load(temp_dir.path()).unwrap();

        assert_eq!(loaded.hub.status_history, 10);
        assert_eq!(loaded.log.level, "debug");
    }

    #[test]
    fn test_init_config() {
        let temp_dir = TempDir::new().unwrap();

        assert!(Config::init(temp_dir.path()).unwrap());
        assert!(!Config::init(temp_dir.path()).unwrap());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[store]
file = "agent_communication.json"

[hub]
lock_manager = "Gatekeeper"
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.file, "agent_communication.json");
        assert_eq!(config.hub.lock_manager, "Gatekeeper");
        assert_eq!(config.hub.status_history, 50);
        assert_eq!(config.hub.integration_agent, "integration_agent");
    }

    #[test]
    fn test_store_path() {
        let config = Config::default();
        assert_eq!(
            config.store_path(Path::new("/work/.agenthub")),
            PathBuf::from("/work/.agenthub/hub.json")
        );
    }

    #[test]
    fn test_malformed_config_is_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("config.toml"), "[hub\nbroken").unwrap();
        assert!(Config::load(temp_dir.path()).is_err());
    }
}
