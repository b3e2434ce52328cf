//! Sync engine configuration with TOML file support.

use serde::{Deserialize, Serialize};
use shroud_utils::LogFormat;
use std::path::{Path, PathBuf};

use crate::queue::LanePriority;
use crate::SyncError;

/// Largest number of inputs one transaction can spend.
pub const MAX_TRANSACTION_INPUTS: usize = 4;

/// Configuration for the sync engine and the wallet built on it.
///
/// Can be loaded from a TOML file via [`SyncConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// Height of the commitment Merkle tree.
    #[serde(default = "default_tree_height")]
    pub tree_height: u8,

    /// Maximum inputs (value plus fee) per transaction.
    #[serde(default = "default_max_inputs")]
    pub max_inputs: usize,

    /// Maximum fee inputs per transaction.
    #[serde(default = "default_max_fee_inputs")]
    pub max_fee_inputs: usize,

    /// Whether the slow lane yields to the fast lane.
    #[serde(default)]
    pub lane_priority: LanePriority,

    /// Queue depth above which enqueueing logs a warning.
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to collect Prometheus metrics.
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./shroud_data")
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_tree_height() -> u8 {
    32
}

fn default_max_inputs() -> usize {
    MAX_TRANSACTION_INPUTS
}

fn default_max_fee_inputs() -> usize {
    3
}

fn default_max_queue() -> usize {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SyncConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SyncError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SyncError> {
        let config: Self = toml::from_str(s).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, SyncError> {
        toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.tree_height == 0 || self.tree_height > shroud_tree::MAX_HEIGHT {
            return Err(SyncError::Config(format!(
                "tree_height must be in 1..={}, got {}",
                shroud_tree::MAX_HEIGHT,
                self.tree_height
            )));
        }
        if self.max_inputs == 0 || self.max_inputs > MAX_TRANSACTION_INPUTS {
            return Err(SyncError::Config(format!(
                "max_inputs must be in 1..={MAX_TRANSACTION_INPUTS}, got {}",
                self.max_inputs
            )));
        }
        if self.max_fee_inputs >= self.max_inputs {
            return Err(SyncError::Config(format!(
                "max_fee_inputs ({}) must leave room for a value input (max_inputs {})",
                self.max_fee_inputs, self.max_inputs
            )));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size: default_map_size(),
            tree_height: default_tree_height(),
            max_inputs: default_max_inputs(),
            max_fee_inputs: default_max_fee_inputs(),
            lane_priority: LanePriority::default(),
            max_queue: default_max_queue(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            enable_metrics: default_true(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = SyncConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = SyncConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = SyncConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.tree_height, 32);
        assert_eq!(config.max_inputs, 4);
        assert_eq!(config.max_fee_inputs, 3);
        assert_eq!(config.lane_priority, LanePriority::Independent);
        assert_eq!(config.log_format, LogFormat::Human);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            tree_height = 16
            lane_priority = "fast_first"
            log_format = "json"
        "#;
        let config = SyncConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.tree_height, 16);
        assert_eq!(config.lane_priority, LanePriority::FastFirst);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.max_queue, 1_000); // default
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(SyncConfig::from_toml_str("tree_height = 0").is_err());
        assert!(SyncConfig::from_toml_str("max_inputs = 5").is_err());
        assert!(SyncConfig::from_toml_str("max_inputs = 2\nmax_fee_inputs = 2").is_err());
    }

    #[test]
    fn missing_file_returns_config_error() {
        let err = SyncConfig::from_toml_file("/nonexistent/shroud.toml").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
