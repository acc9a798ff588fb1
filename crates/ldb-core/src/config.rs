//! ldb.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LdbConfig {
    pub refiner: RefinerConfig,
    pub log: LogConfig,
}

/// Tuning knobs of the overload search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerConfig {
    /// Distance between two tested overload factors.
    pub overload_step: f64,
    /// Overload factor tested at step 0.
    pub overload_start: f64,
    /// Seed for remapping out-of-range prior processors on partial snapshots.
    pub remap_seed: u64,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            overload_step: 0.01,
            overload_start: 1.001,
            remap_seed: 0,
        }
    }
}

impl RefinerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.overload_step.is_nan() || self.overload_step <= 0.0 {
            anyhow::bail!("overload_step must be positive, got {}", self.overload_step);
        }
        if self.overload_start.is_nan() || self.overload_start < 1.0 {
            anyhow::bail!("overload_start must be at least 1.0, got {}", self.overload_start);
        }
        Ok(())
    }

    /// Overload factor for an integer search step.
    pub fn factor(&self, step: i64) -> f64 {
        step as f64 * self.overload_step + self.overload_start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "ldb=info".to_string(),
            json: false,
        }
    }
}

impl LdbConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LdbConfig = toml::from_str(&content)?;
        config.refiner.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
