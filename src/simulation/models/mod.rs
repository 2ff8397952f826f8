//! Learned models of the agent's world.
//!
//! - [`ObservationModel`]: autoencoder between observations and beliefs
//! - [`TransitionModel`]: how beliefs evolve under actions
//! - [`ContentmentModel`]: how desirable a belief state is

mod contentment;
pub mod layer;
pub mod neural_net;
mod observation;
mod transition;

pub use contentment::ContentmentModel;
pub use layer::Layer;
pub use neural_net::NeuralNet;
pub use observation::{ObservationModel, ValidationOutcome};
pub use transition::TransitionModel;

use crate::error::AgentResult;
use crate::simulation::config::AgentConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The three learned models, kept together so the planner can borrow them
/// at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedModels {
    pub transition: TransitionModel,
    pub observation: ObservationModel,
    pub contentment: ContentmentModel,
}

impl LearnedModels {
    pub fn new(
        observation_dims: usize,
        belief_dims: usize,
        action_dims: usize,
        config: &AgentConfig,
        rng: &mut impl Rng,
    ) -> AgentResult<Self> {
        let transition = TransitionModel::new(belief_dims, action_dims, &config.transition, rng);
        let observation =
            ObservationModel::new(observation_dims, belief_dims, &config.observation, rng)?;
        let contentment = ContentmentModel::new(belief_dims, &config.contentment, rng);
        Ok(Self {
            transition,
            observation,
            contentment,
        })
    }

    /// Checks every restored model and buffer.
    pub fn check_restored(&self) -> AgentResult<()> {
        self.transition.check_restored()?;
        self.observation.check_restored()?;
        self.contentment.check_restored()
    }
}
