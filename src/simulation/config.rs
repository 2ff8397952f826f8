//! Runtime configuration for the agent's models and planner.
//!
//! Defaults mirror the constants in [`params`](crate::simulation::params).
//! A config can be loaded from a JSON file; missing fields fall back to defaults.

use crate::error::{AgentError, AgentResult};
use crate::simulation::params;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub capacity: usize,
    pub train_iters: usize,
    pub learning_rate: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            capacity: params::TRANSITION_MEMORY,
            train_iters: params::TRANSITION_TRAIN_ITERS,
            learning_rate: params::LEARNING_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    pub capacity: usize,
    pub train_iters: usize,
    pub calibration_iters: usize,
    pub learning_rate: f64,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            capacity: params::OBSERVATION_MEMORY,
            train_iters: params::OBSERVATION_TRAIN_ITERS,
            calibration_iters: params::CALIBRATION_ITERS,
            learning_rate: params::LEARNING_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentmentConfig {
    pub capacity: usize,
    pub train_iters: usize,
    pub learning_rate: f64,
}

impl Default for ContentmentConfig {
    fn default() -> Self {
        Self {
            capacity: params::CONTENTMENT_MEMORY,
            train_iters: params::CONTENTMENT_TRAIN_ITERS,
            learning_rate: params::LEARNING_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    pub population_size: usize,
    pub iters_per_member: usize,
    pub burn_in: usize,
    pub discount_factor: f64,
    pub exploration_rate: f64,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            population_size: params::POPULATION_SIZE,
            iters_per_member: params::REFINEMENT_ITERS_PER_MEMBER,
            burn_in: params::BURN_IN,
            discount_factor: params::DISCOUNT_FACTOR,
            exploration_rate: params::EXPLORATION_RATE,
        }
    }
}

/// Full agent configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub transition: TransitionConfig,
    pub observation: ObservationConfig,
    pub contentment: ContentmentConfig,
    pub planning: PlanningConfig,
}

impl AgentConfig {
    /// A much cheaper configuration for tests and quick demos.
    #[must_use]
    pub fn light() -> Self {
        Self {
            transition: TransitionConfig {
                capacity: 100,
                train_iters: 20,
                ..TransitionConfig::default()
            },
            observation: ObservationConfig {
                capacity: 100,
                train_iters: 5,
                calibration_iters: 20,
                ..ObservationConfig::default()
            },
            contentment: ContentmentConfig {
                capacity: 100,
                train_iters: 5,
                ..ContentmentConfig::default()
            },
            planning: PlanningConfig {
                population_size: 6,
                iters_per_member: 3,
                burn_in: 5,
                ..PlanningConfig::default()
            },
        }
    }

    /// Reads a JSON config file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> AgentResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded agent config from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn validate(&self) -> AgentResult<()> {
        let rates = [
            ("transition.learning_rate", self.transition.learning_rate),
            ("observation.learning_rate", self.observation.learning_rate),
            ("contentment.learning_rate", self.contentment.learning_rate),
        ];
        for (name, rate) in rates {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(AgentError::InvalidConfig(format!(
                    "{name} must be positive, got {rate}"
                )));
            }
        }
        let capacities = [
            ("transition.capacity", self.transition.capacity),
            ("observation.capacity", self.observation.capacity),
            ("contentment.capacity", self.contentment.capacity),
        ];
        for (name, capacity) in capacities {
            if capacity == 0 {
                return Err(AgentError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }
        if self.planning.population_size < 2 {
            return Err(AgentError::PopulationTooSmall(self.planning.population_size));
        }
        if !(0.0..=1.0).contains(&self.planning.discount_factor) {
            return Err(AgentError::InvalidConfig(format!(
                "planning.discount_factor must lie in [0, 1], got {}",
                self.planning.discount_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.planning.exploration_rate) {
            return Err(AgentError::InvalidConfig(format!(
                "planning.exploration_rate must lie in [0, 1], got {}",
                self.planning.exploration_rate
            )));
        }
        Ok(())
    }
}
