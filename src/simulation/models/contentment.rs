//! Learned utility: how content the agent expects to be in a belief state.

use super::neural_net::NeuralNet;
use crate::error::{check_len, AgentResult};
use crate::simulation::config::ContentmentConfig;
use crate::simulation::memory::TrainingBuffer;
use crate::simulation::oracle::Tutor;
use crate::simulation::params::{
    CONTENTMENT_HIDDEN_PER_BELIEF, CONTENTMENT_MAX_HIDDEN, CONTENTMENT_REGULARIZATION,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maps beliefs to a single contentment score, trained from mentor feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentmentModel {
    model: NeuralNet,
    buffer: TrainingBuffer,
    belief_dims: usize,
    train_iters: usize,
    learning_rate: f64,
    #[serde(skip)]
    tutor: Option<Arc<dyn Tutor>>,
}

impl ContentmentModel {
    #[must_use]
    pub fn new(belief_dims: usize, config: &ContentmentConfig, rng: &mut impl Rng) -> Self {
        let hidden = CONTENTMENT_MAX_HIDDEN.min(CONTENTMENT_HIDDEN_PER_BELIEF * belief_dims);
        Self {
            model: NeuralNet::with_topology(&[belief_dims, hidden, 1], rng),
            buffer: TrainingBuffer::new(config.capacity, belief_dims, 1),
            belief_dims,
            train_iters: config.train_iters,
            learning_rate: config.learning_rate,
            tutor: None,
        }
    }

    #[must_use]
    pub const fn train_size(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub const fn buffer(&self) -> &TrainingBuffer {
        &self.buffer
    }

    #[must_use]
    pub const fn network(&self) -> &NeuralNet {
        &self.model
    }

    pub fn set_tutor(&mut self, tutor: Option<Arc<dyn Tutor>>) {
        self.tutor = tutor;
    }

    pub fn check_restored(&self) -> AgentResult<()> {
        self.model
            .check_shape("contentment network", self.belief_dims, 1)?;
        self.buffer
            .validate("contentment buffer", self.belief_dims, 1)
    }

    /// Records that `beliefs` deserve `target` and trains on the buffer.
    pub fn train_incremental(
        &mut self,
        beliefs: &[f64],
        target: f64,
        rng: &mut impl Rng,
    ) -> AgentResult<()> {
        self.buffer.push(beliefs, &[target])?;
        let iters = self.train_iters.min(self.buffer.len());
        for _ in 0..iters {
            self.do_some_training(rng)?;
        }
        Ok(())
    }

    pub fn do_some_training(&mut self, rng: &mut impl Rng) -> AgentResult<()> {
        let Some(index) = self.buffer.sample_index(rng) else {
            return Ok(());
        };
        self.model.regularize(self.learning_rate, CONTENTMENT_REGULARIZATION);
        self.model.train_incremental(
            self.buffer.input(index),
            self.buffer.target(index),
            self.learning_rate,
        )
    }

    /// Contentment of `beliefs`.
    pub fn evaluate(&mut self, beliefs: &[f64]) -> AgentResult<f64> {
        if let Some(tutor) = &self.tutor {
            return Ok(tutor.evaluate_state(beliefs));
        }
        Ok(self.model.forward(beliefs)?[0])
    }

    /// Same as [`evaluate`](Self::evaluate) but through a shared reference.
    pub fn predict(&self, beliefs: &[f64]) -> AgentResult<f64> {
        if let Some(tutor) = &self.tutor {
            return Ok(tutor.evaluate_state(beliefs));
        }
        check_len("contentment beliefs", self.belief_dims, beliefs.len())?;
        Ok(self.model.predict(beliefs)?[0])
    }
}
