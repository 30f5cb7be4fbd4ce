//! Configuration management for the quota engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{QuotaError, Result};

/// Main configuration for a memquota engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemQuotaConfig {
    /// Deduplication configuration
    #[serde(default)]
    pub deduplication: DeduplicationConfig,
}

/// Deduplication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    /// Minimum time a deduplication id is remembered, in milliseconds.
    ///
    /// Ids actually survive between one and two of these intervals.
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: default_min_duration_ms(),
        }
    }
}

fn default_min_duration_ms() -> u64 {
    1000
}

impl MemQuotaConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading quota engine configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: MemQuotaConfig = serde_yaml::from_str(yaml)
            .map_err(|e| QuotaError::Config(format!("Failed to parse quota config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.deduplication.min_duration_ms == 0 {
            return Err(QuotaError::Config(
                "deduplication window of 0ms is invalid, must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The deduplication reclamation interval.
    pub fn min_deduplication_duration(&self) -> Duration {
        Duration::from_millis(self.deduplication.min_duration_ms)
    }
}
