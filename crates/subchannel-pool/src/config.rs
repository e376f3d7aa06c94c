//! Pool configuration
//!
//! ```toml
//! [pool]
//! sweep_interval_secs = 10
//! ```
//!
//! Every field has a default, so an empty file (or no file) is valid.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::pool::DEFAULT_SWEEP_INTERVAL;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub pool: PoolSettings,
}

/// `[pool]` section
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSettings {
    /// Seconds between sweeps of the global pool
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

impl PoolConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> common::Result<Self> {
        let config: PoolConfig = toml::from_str(contents)?;

        if config.pool.sweep_interval_secs == 0 {
            return Err(common::Error::Config(
                "sweep_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.pool.sweep_interval_secs)
    }
}
