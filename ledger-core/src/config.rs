//! Configuration for the ledger

use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether consecutive events may share a timestamp
    pub timestamp_ordering: TimestampOrdering,
}

/// Ordering rule for `ledgerTimestamp` of consecutive events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampOrdering {
    /// Non-decreasing: equal timestamps are accepted
    #[default]
    AllowTies,
    /// Strictly increasing
    Strict,
}

impl TimestampOrdering {
    /// Whether an event at `timestamp` may follow one at `latest`
    pub fn accepts(self, timestamp: i64, latest: i64) -> bool {
        match self {
            TimestampOrdering::AllowTies => timestamp >= latest,
            TimestampOrdering::Strict => timestamp > latest,
        }
    }
}

impl std::str::FromStr for TimestampOrdering {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "allow_ties" => Ok(TimestampOrdering::AllowTies),
            "strict" => Ok(TimestampOrdering::Strict),
            other => Err(crate::Error::Config(format!(
                "invalid timestamp ordering {other:?}, expected \"allow_ties\" or \"strict\""
            ))),
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
        if let Ok(ordering) = std::env::var("LEDGER_TIMESTAMP_ORDERING") {
            self.timestamp_ordering = ordering.parse()?;
        }
        Ok(())
    }
}
