use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Default hard cap on the number of regions admitted to the frontier
pub const DEFAULT_MAX_FRONTIER_REGIONS: usize = 10_000;

/// Configuration for a slicing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SliceConfig {
    /// Records with a mapping quality below this are filtered before acceptance
    pub min_mapping_quality: u8,

    /// Maximum number of regions (initial plus discovered) the frontier will admit
    pub max_frontier_regions: usize,

    /// Bases of padding either side of a pending position when it becomes a region
    pub derived_region_margin: u64,

    /// Number of scanning workers
    pub threads: usize,

    /// Accept secondary alignments as direct hits
    pub include_secondary: bool,

    /// Wall-clock budget; when exhausted the run stops like a cancellation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_runtime_secs: Option<u64>,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            min_mapping_quality: 0,
            max_frontier_regions: DEFAULT_MAX_FRONTIER_REGIONS,
            derived_region_margin: 0,
            threads: 1,
            include_secondary: false,
            max_runtime_secs: None,
        }
    }
}

impl SliceConfig {
    /// Load a config from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, `ConfigError::ParseError`
    /// for malformed JSON, or `ConfigError::Invalid` if the values fail validation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a config from a JSON string
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` for malformed JSON or `ConfigError::Invalid` if
    /// the values fail validation.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values are usable
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `threads` or `max_frontier_regions` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::Invalid("threads must be at least 1".to_string()));
        }
        if self.max_frontier_regions == 0 {
            return Err(ConfigError::Invalid(
                "max_frontier_regions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_runtime(&self) -> Option<Duration> {
        self.max_runtime_secs.map(Duration::from_secs)
    }
}
