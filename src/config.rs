//! Simulation configuration.
//!
//! Width and height are given in pixels and must be exact multiples of the
//! cell size; the grid dimensions are derived from them. Validation fails
//! fast instead of silently rounding.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Edge length of a grid cell in pixels.
pub const CELL_SIZE: u32 = 10;

/// Population quarantine policy and obstacle layout selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Everyone moves freely.
    FreeForAll,
    /// A physical wall splits the grid; it is eased open over time.
    ForcedQuarantine,
    /// Three quarters of the population is locked down.
    QuarterFree,
    /// Seven in eight stay home.
    OneInEightFree,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{axis} {value} is not divisible by the cell size {cell}", cell = CELL_SIZE)]
    SizeNotDivisible { axis: &'static str, value: u32 },
    #[error("{axis} must be at least one cell ({cell} px)", cell = CELL_SIZE)]
    SizeTooSmall { axis: &'static str },
}

fn default_seed() -> u64 {
    7
}

fn default_step_interval_ms() -> u64 {
    1_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub width: u32,
    pub height: u32,
    pub entities: usize,
    pub scenario: Scenario,
    #[serde(default)]
    pub allow_deaths: bool,
    #[serde(default)]
    pub allow_age: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Minimum real time between simulated steps when ticks are driven by
    /// a wall clock.
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 650,
            height: 400,
            entities: 200,
            scenario: Scenario::FreeForAll,
            allow_deaths: false,
            allow_age: false,
            seed: default_seed(),
            step_interval_ms: default_step_interval_ms(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (axis, value) in [("width", self.width), ("height", self.height)] {
            if value < CELL_SIZE {
                return Err(ConfigError::SizeTooSmall { axis });
            }
            if value % CELL_SIZE != 0 {
                return Err(ConfigError::SizeNotDivisible { axis, value });
            }
        }
        Ok(())
    }

    /// Grid dimensions in cells. Only meaningful after [`validate`].
    ///
    /// [`validate`]: SimConfig::validate
    pub fn grid_size(&self) -> (i32, i32) {
        (
            (self.width / CELL_SIZE) as i32,
            (self.height / CELL_SIZE) as i32,
        )
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: SimConfig = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }
}
