//! Learned dynamics: how beliefs change when actions are performed.
//!
//! The network predicts the belief *delta*; predictions are added to the
//! current beliefs and clipped to `[-1, 1]`.

use super::neural_net::NeuralNet;
use crate::error::{check_len, AgentResult};
use crate::simulation::config::TransitionConfig;
use crate::simulation::math::{clip, squared_distance};
use crate::simulation::memory::TrainingBuffer;
use crate::simulation::oracle::Tutor;
use crate::simulation::params::{
    MIN_HIDDEN_UNITS, TRANSITION_ITERS_PER_SAMPLE, TRANSITION_REGULARIZATION,
};
use crate::simulation::planning::Plan;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionModel {
    model: NeuralNet,
    buffer: TrainingBuffer,
    belief_dims: usize,
    action_dims: usize,
    train_iters: usize,
    learning_rate: f64,
    progress: usize,
    err: f64,
    last_error: f64,
    #[serde(skip)]
    tutor: Option<Arc<dyn Tutor>>,
}

impl TransitionModel {
    #[must_use]
    pub fn new(
        belief_dims: usize,
        action_dims: usize,
        config: &TransitionConfig,
        rng: &mut impl Rng,
    ) -> Self {
        let hidden = MIN_HIDDEN_UNITS.max(belief_dims);
        Self {
            model: NeuralNet::with_topology(&[belief_dims + action_dims, hidden, belief_dims], rng),
            buffer: TrainingBuffer::new(config.capacity, belief_dims + action_dims, belief_dims),
            belief_dims,
            action_dims,
            train_iters: config.train_iters,
            learning_rate: config.learning_rate,
            progress: 0,
            err: 0.0,
            last_error: 0.0,
            tutor: None,
        }
    }

    #[must_use]
    pub const fn belief_dims(&self) -> usize {
        self.belief_dims
    }

    #[must_use]
    pub const fn action_dims(&self) -> usize {
        self.action_dims
    }

    /// Number of buffered transitions.
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

    /// RMS training error over the most recent full window.
    #[must_use]
    pub const fn last_error(&self) -> f64 {
        self.last_error
    }

    pub fn set_tutor(&mut self, tutor: Option<Arc<dyn Tutor>>) {
        self.tutor = tutor;
    }

    /// Forgets every buffered transition. Called when the belief space changes.
    pub fn reset_training_data(&mut self) {
        self.buffer.reset();
    }

    /// Checks a restored model's network and buffer against its dimensions.
    pub fn check_restored(&self) -> AgentResult<()> {
        let input = self.belief_dims + self.action_dims;
        self.model
            .check_shape("transition network", input, self.belief_dims)?;
        self.buffer
            .validate("transition buffer", input, self.belief_dims)
    }

    /// Records one observed transition and trains on the buffer.
    pub fn train_incremental(
        &mut self,
        beliefs: &[f64],
        actions: &[f64],
        next_beliefs: &[f64],
        rng: &mut impl Rng,
    ) -> AgentResult<()> {
        check_len("transition beliefs", self.belief_dims, beliefs.len())?;
        check_len("transition actions", self.action_dims, actions.len())?;
        check_len("transition next beliefs", self.belief_dims, next_beliefs.len())?;

        let input = [beliefs, actions].concat();
        let delta: Vec<f64> = next_beliefs.iter().zip(beliefs).map(|(n, b)| n - b).collect();
        self.buffer.push(&input, &delta)?;

        let iters = self
            .train_iters
            .min(TRANSITION_ITERS_PER_SAMPLE * self.buffer.len());
        for _ in 0..iters {
            self.do_some_training(rng)?;
        }
        Ok(())
    }

    /// One regularized SGD step on a uniformly sampled transition.
    pub fn do_some_training(&mut self, rng: &mut impl Rng) -> AgentResult<()> {
        let Some(index) = self.buffer.sample_index(rng) else {
            return Ok(());
        };
        self.model.regularize(self.learning_rate, TRANSITION_REGULARIZATION);
        let (input, target) = (self.buffer.input(index), self.buffer.target(index));
        self.model.train_incremental(input, target, self.learning_rate)?;
        self.err += squared_distance(self.model.output(), target);

        self.progress += 1;
        if self.progress >= self.buffer.capacity() {
            self.last_error = (self.err / self.buffer.capacity() as f64).sqrt();
            log::debug!("transition model window error {:.5}", self.last_error);
            self.progress = 0;
            self.err = 0.0;
        }
        Ok(())
    }

    /// Writes the beliefs anticipated after performing `actions` into `out`.
    pub fn anticipate_next_beliefs_in_place(
        &mut self,
        beliefs: &[f64],
        actions: &[f64],
        out: &mut [f64],
    ) -> AgentResult<()> {
        check_len("anticipated beliefs", self.belief_dims, out.len())?;
        if let Some(tutor) = &self.tutor {
            tutor.transition(beliefs, actions, out);
            return Ok(());
        }
        check_len("transition beliefs", self.belief_dims, beliefs.len())?;
        let delta = self.model.forward2(beliefs, actions)?;
        for ((o, b), d) in out.iter_mut().zip(beliefs).zip(delta) {
            *o = b + d;
        }
        clip(out, -1.0, 1.0);
        Ok(())
    }

    pub fn anticipate_next_beliefs(
        &mut self,
        beliefs: &[f64],
        actions: &[f64],
    ) -> AgentResult<Vec<f64>> {
        let mut out = vec![0.0; self.belief_dims];
        self.anticipate_next_beliefs_in_place(beliefs, actions, &mut out)?;
        Ok(out)
    }

    /// Beliefs anticipated after executing every step of `plan` from `beliefs`.
    pub fn final_beliefs(&mut self, beliefs: &[f64], plan: &Plan) -> AgentResult<Vec<f64>> {
        check_len("transition beliefs", self.belief_dims, beliefs.len())?;
        let mut current = beliefs.to_vec();
        let mut next = vec![0.0; self.belief_dims];
        for actions in plan.iter() {
            self.anticipate_next_beliefs_in_place(&current, actions, &mut next)?;
            std::mem::swap(&mut current, &mut next);
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model(rng: &mut StdRng) -> TransitionModel {
        let config = TransitionConfig {
            capacity: 50,
            train_iters: 40,
            ..TransitionConfig::default()
        };
        TransitionModel::new(2, 1, &config, rng)
    }

    #[test]
    fn test_final_beliefs_dimension_and_range() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut m = model(&mut rng);
        let plan = Plan::random(6, 1, &mut rng);
        let start = [0.95, -0.95];
        let end = m.final_beliefs(&start, &plan).unwrap();
        assert_eq!(end.len(), 2);
        assert!(end.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(start, [0.95, -0.95], "inputs must be untouched");
    }

    #[test]
    fn test_empty_plan_returns_start() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut m = model(&mut rng);
        let end = m.final_beliefs(&[0.2, 0.3], &Plan::new()).unwrap();
        assert_eq!(end, vec![0.2, 0.3]);
    }

    #[test]
    fn test_train_incremental_buffers_and_resets() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut m = model(&mut rng);
        for _ in 0..3 {
            m.train_incremental(&[0.1, 0.1], &[0.5], &[0.2, 0.0], &mut rng)
                .unwrap();
        }
        assert_eq!(m.train_size(), 3);
        assert!((m.buffer().target(0)[0] - 0.1).abs() < 1e-12, "stores the delta");

        m.reset_training_data();
        assert_eq!(m.train_size(), 0);
    }

    #[test]
    fn test_train_incremental_rejects_mismatch() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut m = model(&mut rng);
        assert!(m
            .train_incremental(&[0.1], &[0.5], &[0.2, 0.0], &mut rng)
            .is_err());
        assert_eq!(m.train_size(), 0);
    }

    #[test]
    fn test_learns_constant_drift() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut m = model(&mut rng);
        for _ in 0..300 {
            let b = [rng.random_range(-0.5..0.5), rng.random_range(-0.5..0.5)];
            let a = [rng.random::<f64>()];
            let next = [b[0] + 0.1, b[1] - 0.05];
            m.train_incremental(&b, &a, &next, &mut rng).unwrap();
        }
        let pred = m.anticipate_next_beliefs(&[0.0, 0.0], &[0.5]).unwrap();
        assert!((pred[0] - 0.1).abs() < 0.05, "pred {pred:?}");
        assert!((pred[1] + 0.05).abs() < 0.05, "pred {pred:?}");
    }
}
