//! Planning configuration
//!
//! Every threshold the engines use is a named default that can be overridden
//! from a TOML file:
//!
//! ```toml
//! [detection]
//! default_port_capacity = 3
//!
//! [detection.overlap]
//! medium_from = 2
//! high_from = 5
//! critical_from = 10
//!
//! [detection.port_capacities]
//! Rotterdam = 6
//!
//! [allocation]
//! partial_economics = "utilization-only"
//!
//! [timeline]
//! default_horizon_days = 120
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conflict::{ExcessThresholds, OverlapThresholds};

/// Simultaneous port calls a port accepts when no override is configured
pub const DEFAULT_PORT_CAPACITY: u32 = 2;

/// Timeline length used when the caller does not pick one
pub const DEFAULT_HORIZON_DAYS: u32 = 90;

/// Configuration loading or validation error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How revenue/cost ranking treats candidates without figures
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartialEconomicsPolicy {
    /// Rank candidates with figures first; the rest follow by utilization
    #[default]
    PreferPriced,
    /// Use figures only when every candidate has one, otherwise rank by utilization
    UtilizationOnly,
}

/// Conflict detector settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub overlap: OverlapThresholds,
    pub port_excess: ExcessThresholds,
    pub default_port_capacity: u32,
    /// Per-port capacity overrides, keyed by port name
    pub port_capacities: BTreeMap<String, u32>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            overlap: OverlapThresholds::default(),
            port_excess: ExcessThresholds::default(),
            default_port_capacity: DEFAULT_PORT_CAPACITY,
            port_capacities: BTreeMap::new(),
        }
    }
}

impl DetectionConfig {
    /// Capacity of a port, falling back to the default
    pub fn port_capacity(&self, port: &str) -> u32 {
        self.port_capacities
            .get(port)
            .copied()
            .unwrap_or(self.default_port_capacity)
    }

    pub fn with_port_capacity(mut self, port: impl Into<String>, capacity: u32) -> Self {
        self.port_capacities.insert(port.into(), capacity);
        self
    }
}

/// Annual allocator settings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub partial_economics: PartialEconomicsPolicy,
}

/// Timeline projection settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub default_horizon_days: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            default_horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

/// Top-level planning configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    pub detection: DetectionConfig,
    pub allocation: AllocationConfig,
    pub timeline: TimelineConfig,
}

impl PlanningConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.detection.overlap.is_ascending() {
            return Err(ConfigError::Invalid(
                "detection.overlap thresholds must be ascending".into(),
            ));
        }
        if !self.detection.port_excess.is_ascending() {
            return Err(ConfigError::Invalid(
                "detection.port_excess thresholds must be non-negative and ascending".into(),
            ));
        }
        if self.detection.default_port_capacity == 0 {
            return Err(ConfigError::Invalid(
                "detection.default_port_capacity must be at least 1".into(),
            ));
        }
        if let Some((port, _)) = self
            .detection
            .port_capacities
            .iter()
            .find(|(_, capacity)| **capacity == 0)
        {
            return Err(ConfigError::Invalid(format!(
                "capacity of port {port} must be at least 1"
            )));
        }
        if self.timeline.default_horizon_days == 0 {
            return Err(ConfigError::Invalid(
                "timeline.default_horizon_days must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
