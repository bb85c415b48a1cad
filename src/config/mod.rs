mod defaults;
mod io;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use types::*;
pub use validation::*;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level agentdash client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub toast: ToastConfig,
    #[serde(default)]
    pub forms: FormsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(find_config_file);

        let mut config = match config_path {
            Some(config_path) if config_path.exists() => {
                info!("Loading config from {}", config_path.display());
                let mut config = load_config_file(&config_path)?;
                config.source = Some(config_path);
                config
            }
            Some(config_path) => {
                warn!("Config file {} not found, using defaults", config_path.display());
                Config::default()
            }
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Write default configuration to a file.
    pub fn write_default(path: &str) -> Result<()> {
        let value = serde_json::to_value(Config::default())?;
        write_config_file(Path::new(path), &value)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("AGENTDASH_BASE_URL") {
            self.api.base_url = url;
        }

        if let Some(token) = lookup("AGENTDASH_API_TOKEN") {
            self.api.token = Some(token);
        }

        if let Some(delay) = lookup("AGENTDASH_RECONNECT_DELAY_MS") {
            match delay.parse() {
                Ok(delay) => self.realtime.reconnect_delay_ms = delay,
                Err(_) => warn!("Ignoring AGENTDASH_RECONNECT_DELAY_MS={delay}: not a number"),
            }
        }

        if let Some(level) = lookup("AGENTDASH_LOG_LEVEL") {
            match level.parse() {
                Ok(level) => self.logging.level = level,
                Err(e) => warn!("Ignoring AGENTDASH_LOG_LEVEL: {e}"),
            }
        }
    }

    /// Change-detection hash of the effective configuration.
    pub fn snapshot_hash(&self) -> String {
        serde_json::to_value(self)
            .map(|v| resolve_config_snapshot_hash(&v))
            .unwrap_or_default()
    }
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILE_NAMES {
        let path = PathBuf::from(name);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".agentdash").join("config.json");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

/// Load configuration from a file path.
fn load_config_file(path: &Path) -> Result<Config> {
    let value = read_config_file_snapshot(path)?;
    let config = serde_json::from_value(value)
        .with_context(|| format!("Invalid configuration in '{}'", path.display()))?;
    Ok(config)
}
