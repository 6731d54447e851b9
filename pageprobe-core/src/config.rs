//! Analysis configuration.

use crate::delay::LONG_QUEUING_DELAY_THRESHOLD_MS;
use crate::error::{AnalysisError, Result};
use crate::simulation::{Coefficients, SimulationOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Tunables for chain and delay analysis. Every field has a default, so a
/// config file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum task length that produces queuing delay.
    pub long_task_threshold_ms: f64,
    /// Weights used to blend optimistic and pessimistic simulated delay.
    pub coefficients: Coefficients,
    pub simulation: SimulationOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            long_task_threshold_ms: LONG_QUEUING_DELAY_THRESHOLD_MS,
            coefficients: Coefficients::default(),
            simulation: SimulationOptions::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading analysis config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.long_task_threshold_ms.is_finite() && self.long_task_threshold_ms > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "long_task_threshold_ms must be positive, got {}",
                self.long_task_threshold_ms
            )));
        }

        let Coefficients {
            intercept,
            optimistic,
            pessimistic,
        } = self.coefficients;
        if ![intercept, optimistic, pessimistic]
            .iter()
            .all(|c| c.is_finite())
        {
            return Err(AnalysisError::InvalidInput(
                "coefficients must be finite".to_string(),
            ));
        }

        if self.simulation.max_concurrent_requests == 0 {
            return Err(AnalysisError::InvalidInput(
                "simulation.max_concurrent_requests must be at least 1".to_string(),
            ));
        }

        let multiplier = self.simulation.cpu_slowdown_multiplier;
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "simulation.cpu_slowdown_multiplier must be positive, got {}",
                multiplier
            )));
        }

        Ok(())
    }
}
