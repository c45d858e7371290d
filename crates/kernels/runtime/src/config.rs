//! Runtime configuration loaded from YAML.
//!
//! ```yaml
//! apiVersion: lumen/v1
//! kind: RuntimeConfig
//! continuity:
//!   position: { baseDurationMs: 150, decayCurve: exponential, timeScaleMultiplier: 1.0 }
//! health:
//!   capacity: 256
//! pool:
//!   maxBuffersPerSize: 32
//! ```
//!
//! Every section and field is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::continuity::ContinuityConfig;
use crate::health;
use crate::pool;

const API_VERSION: &str = "lumen/v1";
const KIND: &str = "RuntimeConfig";

/// Errors that can occur when loading or validating a runtime config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the config YAML.
    #[error("failed to parse config YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid API version.
    #[error("invalid apiVersion: expected 'lumen/v1', got '{0}'")]
    InvalidApiVersion(String),

    /// Invalid kind.
    #[error("invalid kind: expected 'RuntimeConfig', got '{0}'")]
    InvalidKind(String),

    /// A value outside its valid range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: String,
        reason: &'static str,
    },
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Health monitor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthConfig {
    /// Retained health events.
    pub capacity: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            capacity: health::DEFAULT_CAPACITY,
        }
    }
}

/// Buffer pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    /// Idle buffers kept per buffer length.
    pub max_buffers_per_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_buffers_per_size: pool::DEFAULT_MAX_PER_SIZE,
        }
    }
}

/// Settings for one running program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// API version for compatibility checking.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Kind must be "RuntimeConfig".
    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub continuity: ContinuityConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub pool: PoolConfig,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            continuity: ContinuityConfig::default(),
            health: HealthConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load a config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a config from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate_schema()?;
        Ok(config)
    }

    /// Validate API version, kind and continuity ranges.
    fn validate_schema(&self) -> ConfigResult<()> {
        if self.api_version != API_VERSION {
            return Err(ConfigError::InvalidApiVersion(self.api_version.clone()));
        }
        if self.kind != KIND {
            return Err(ConfigError::InvalidKind(self.kind.clone()));
        }
        for semantic in lumen_ir::ContinuitySemantic::ALL {
            let params = self.continuity.params(semantic);
            if params.base_duration_ms.is_nan() || params.base_duration_ms < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("continuity.{semantic}.baseDurationMs"),
                    reason: "must be a non-negative number",
                });
            }
            if params.time_scale_multiplier.is_nan() || params.time_scale_multiplier < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("continuity.{semantic}.timeScaleMultiplier"),
                    reason: "must be a non-negative number",
                });
            }
        }
        Ok(())
    }
}
