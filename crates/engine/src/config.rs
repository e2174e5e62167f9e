//! Engine configuration
//!
//! ```toml
//! default_policy = "required"
//!
//! [pool]
//! max_size = 16
//! acquire_timeout_ms = 5000
//! double_release = "fail"
//! ```
//!
//! Every field is optional; omitted fields take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use txscope_core::{Error, Propagation, Result};
use txscope_resource::PoolConfig;

/// Runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Policy used by scopes that do not name one
    pub default_policy: Propagation,
    /// Resource pool settings
    pub pool: PoolConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()
    }
}
