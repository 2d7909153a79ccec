//! Simulation tunables.
//!
//! All knobs the host can adjust at runtime. The struct is serde-enabled so
//! the wasm facade can exchange it with JavaScript as a plain object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tunable was set to a value outside its validated range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// A force constant must be a positive finite number.
    NonPositiveConstant(&'static str, f32),
    /// An integer interval must be at least 1.
    ZeroInterval(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveConstant(name, value) => {
                write!(f, "{name} must be positive, got {value}")
            }
            Self::ZeroInterval(name) => write!(f, "{name} must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Force simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationConfig {
    /// Coulomb repulsion constant `Ke` (default: 100.0).
    pub repulsion_constant: f32,
    /// Hooke spring constant `K` applied along edges (default: 15.0).
    pub spring_constant: f32,
    /// Integer divisor controlling per-step movement; higher is slower
    /// (default: 50).
    pub time_step: u32,
    /// How many node computations are grouped per parallel work unit.
    /// Performance knob only; never affects results (default: 64).
    pub batch_size: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            repulsion_constant: 100.0,
            spring_constant: 15.0,
            time_step: 50,
            batch_size: 64,
        }
    }
}

impl SimulationConfig {
    /// Set the repulsion constant. Must be positive and finite.
    pub fn set_repulsion_constant(&mut self, value: f32) -> Result<(), ConfigError> {
        if !(value > 0.0) || !value.is_finite() {
            return Err(ConfigError::NonPositiveConstant("repulsion constant", value));
        }
        self.repulsion_constant = value;
        Ok(())
    }

    /// Set the spring constant. Must be positive and finite.
    pub fn set_spring_constant(&mut self, value: f32) -> Result<(), ConfigError> {
        if !(value > 0.0) || !value.is_finite() {
            return Err(ConfigError::NonPositiveConstant("spring constant", value));
        }
        self.spring_constant = value;
        Ok(())
    }

    /// Set the time step divisor. Must be at least 1.
    pub fn set_time_step(&mut self, value: u32) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::ZeroInterval("time step"));
        }
        self.time_step = value;
        Ok(())
    }

    /// Set the parallel batch size. Must be at least 1.
    pub fn set_batch_size(&mut self, value: u32) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::ZeroInterval("batch size"));
        }
        self.batch_size = value;
        Ok(())
    }

    /// Validate a whole config, e.g. one deserialized from the host.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut check = *self;
        check.set_repulsion_constant(self.repulsion_constant)?;
        check.set_spring_constant(self.spring_constant)?;
        check.set_time_step(self.time_step)?;
        check.set_batch_size(self.batch_size)?;
        Ok(())
    }
}
