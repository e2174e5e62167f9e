//! Pool configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Semaphore;
use txscope_core::{Error, Result};

/// What to do when a handle is released a second time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubleReleasePolicy {
    /// Reject with [`Error::DoubleRelease`] and log at error level
    Fail,
    /// Ignore with a warning
    Warn,
}

impl Default for DoubleReleasePolicy {
    /// `Fail` in debug builds, `Warn` in release builds
    fn default() -> Self {
        if cfg!(debug_assertions) {
            DoubleReleasePolicy::Fail
        } else {
            DoubleReleasePolicy::Warn
        }
    }
}

/// Resource pool options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Maximum number of resources handed out at once
    pub max_size: usize,
    /// Bounded wait for a free resource, in milliseconds
    pub acquire_timeout_ms: u64,
    /// Double release handling
    pub double_release: DoubleReleasePolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_size: 16,
            acquire_timeout_ms: 5_000,
            double_release: DoubleReleasePolicy::default(),
        }
    }
}

impl PoolConfig {
    /// Set the pool size
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the acquire bound
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the double release policy
    pub fn with_double_release(mut self, policy: DoubleReleasePolicy) -> Self {
        self.double_release = policy;
        self
    }

    /// Acquire bound as a `Duration`
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Reject unusable settings
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::InvalidConfig("pool.max_size must be > 0".into()));
        }
        if self.max_size > Semaphore::MAX_PERMITS {
            return Err(Error::InvalidConfig(format!(
                "pool.max_size must be <= {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "pool.acquire_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}
