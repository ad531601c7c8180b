//! Configuration for the ledger manager

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Path of the `ledger.json` event log
    pub ledger_path: PathBuf,

    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,

    /// Record sync metrics
    pub metrics_enabled: bool,

    /// Ledger configuration
    pub ledger: ledger_core::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "ledger-manager".to_string(),
            ledger_path: PathBuf::from("./data/ledger.json"),
            log_level: "info".to_string(),
            metrics_enabled: true,
            ledger: ledger_core::Config::default(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields set in the environment
    pub fn apply_env(&mut self) -> crate::Result<()> {
        if let Ok(path) = std::env::var("LEDGER_PATH") {
            self.ledger_path = PathBuf::from(path);
        }

        if let Ok(level) = std::env::var("LEDGER_LOG_LEVEL") {
            self.log_level = level;
        }

        self.ledger.apply_env()?;
        Ok(())
    }
}
