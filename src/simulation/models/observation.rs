//! Bidirectional map between observations and beliefs.
//!
//! The encoder maps observations to beliefs and the decoder maps them back;
//! both are trained together as an autoencoder. Training only touches an
//! experimental copy of the pair. The copy is adopted when it reconstructs
//! held-out observations clearly better than the live pair, because a new
//! belief space invalidates everything the transition model has learned.

use super::neural_net::NeuralNet;
use super::transition::TransitionModel;
use crate::error::{check_len, AgentError, AgentResult};
use crate::simulation::config::ObservationConfig;
use crate::simulation::math::{clip, squared_distance};
use crate::simulation::memory::TrainingBuffer;
use crate::simulation::oracle::Tutor;
use crate::simulation::params::{MIN_HIDDEN_UNITS, OBSERVATION_REGULARIZATION, PROMOTION_MARGIN};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of comparing the live and experimental autoencoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    /// Experimental pair adopted; transition training data cleared.
    Promoted,
    /// Experimental pair reset to the live one.
    Reverted,
    Kept,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationModel {
    encoder: NeuralNet,
    decoder: NeuralNet,
    encoder_experimental: NeuralNet,
    decoder_experimental: NeuralNet,
    train: TrainingBuffer,
    validation: TrainingBuffer,
    observation_dims: usize,
    belief_dims: usize,
    train_iters: usize,
    calibration_iters: usize,
    learning_rate: f64,
    progress: usize,
    promotions: usize,
    last_live_error: f64,
    last_experimental_error: f64,
    #[serde(skip)]
    tutor: Option<Arc<dyn Tutor>>,
}

impl ObservationModel {
    /// Builds the model; `belief_dims` may not exceed `observation_dims`.
    pub fn new(
        observation_dims: usize,
        belief_dims: usize,
        config: &ObservationConfig,
        rng: &mut impl Rng,
    ) -> AgentResult<Self> {
        if belief_dims > observation_dims {
            return Err(AgentError::InvalidDimensions(format!(
                "belief dims ({belief_dims}) must not exceed observation dims ({observation_dims})"
            )));
        }
        let hidden = MIN_HIDDEN_UNITS.max((observation_dims + belief_dims) / 2);
        let encoder = NeuralNet::with_topology(&[observation_dims, hidden, belief_dims], rng);
        let decoder = NeuralNet::with_topology(&[belief_dims, hidden, observation_dims], rng);
        Ok(Self {
            encoder_experimental: encoder.clone(),
            decoder_experimental: decoder.clone(),
            encoder,
            decoder,
            train: TrainingBuffer::new(config.capacity, observation_dims, 0),
            validation: TrainingBuffer::new(config.capacity, observation_dims, 0),
            observation_dims,
            belief_dims,
            train_iters: config.train_iters,
            calibration_iters: config.calibration_iters,
            learning_rate: config.learning_rate,
            progress: 0,
            promotions: 0,
            last_live_error: 0.0,
            last_experimental_error: 0.0,
            tutor: None,
        })
    }

    #[must_use]
    pub const fn observation_dims(&self) -> usize {
        self.observation_dims
    }

    #[must_use]
    pub const fn belief_dims(&self) -> usize {
        self.belief_dims
    }

    #[must_use]
    pub const fn train_buffer(&self) -> &TrainingBuffer {
        &self.train
    }

    #[must_use]
    pub const fn validation_buffer(&self) -> &TrainingBuffer {
        &self.validation
    }

    /// How many times the experimental pair has been adopted.
    #[must_use]
    pub const fn promotions(&self) -> usize {
        self.promotions
    }

    /// Validation RMSE of the live and experimental pairs at the last check.
    #[must_use]
    pub const fn last_errors(&self) -> (f64, f64) {
        (self.last_live_error, self.last_experimental_error)
    }

    #[must_use]
    pub const fn encoder(&self) -> &NeuralNet {
        &self.encoder
    }

    #[must_use]
    pub const fn decoder(&self) -> &NeuralNet {
        &self.decoder
    }

    pub fn encoder_experimental_mut(&mut self) -> &mut NeuralNet {
        &mut self.encoder_experimental
    }

    pub fn decoder_experimental_mut(&mut self) -> &mut NeuralNet {
        &mut self.decoder_experimental
    }

    pub fn decoder_mut(&mut self) -> &mut NeuralNet {
        &mut self.decoder
    }

    pub fn set_tutor(&mut self, tutor: Option<Arc<dyn Tutor>>) {
        self.tutor = tutor;
    }

    /// Checks a restored model's networks and buffers against its dimensions.
    pub fn check_restored(&self) -> AgentResult<()> {
        let (o, b) = (self.observation_dims, self.belief_dims);
        self.encoder.check_shape("encoder", o, b)?;
        self.decoder.check_shape("decoder", b, o)?;
        self.encoder_experimental
            .check_shape("experimental encoder", o, b)?;
        self.decoder_experimental
            .check_shape("experimental decoder", b, o)?;
        self.train.validate("observation train buffer", o, 0)?;
        self.validation.validate("observation validation buffer", o, 0)
    }

    /// Buffers an observation and trains the experimental autoencoder.
    pub fn train_incremental(
        &mut self,
        observation: &[f64],
        transition: &mut TransitionModel,
        rng: &mut impl Rng,
    ) -> AgentResult<()> {
        check_len("observation", self.observation_dims, observation.len())?;
        if self.validation.position() < self.train.position() {
            self.validation.push(observation, &[])?;
        } else {
            self.train.push(observation, &[])?;
        }

        let iters = self.train_iters.min(self.train.len());
        for _ in 0..iters {
            self.do_some_training(transition, rng)?;
        }
        Ok(())
    }

    /// One autoencoder SGD step on a sampled training observation. Every
    /// `capacity` steps the pairs are compared with [`validate`](Self::validate).
    pub fn do_some_training(
        &mut self,
        transition: &mut TransitionModel,
        rng: &mut impl Rng,
    ) -> AgentResult<Option<ValidationOutcome>> {
        let Some(index) = self.train.sample_index(rng) else {
            return Ok(None);
        };
        let lr = self.learning_rate;
        self.encoder_experimental.regularize(lr, OBSERVATION_REGULARIZATION);
        self.decoder_experimental.regularize(lr, OBSERVATION_REGULARIZATION);

        let observation = self.train.input(index);
        self.encoder_experimental.forward(observation)?;
        self.decoder_experimental.forward(self.encoder_experimental.output())?;
        self.decoder_experimental.backward(observation)?;
        self.encoder_experimental.backward_from(&self.decoder_experimental)?;
        self.encoder_experimental.update_weights(observation, lr)?;
        // Weight updates leave activations alone, so the encoder output is still the belief.
        self.decoder_experimental
            .update_weights(self.encoder_experimental.output(), lr)?;

        self.progress += 1;
        if self.progress >= self.train.capacity() {
            self.progress = 0;
            return self.validate(transition).map(Some);
        }
        Ok(None)
    }

    /// Compares live and experimental reconstruction error on the
    /// validation set and promotes or reverts the experimental pair.
    pub fn validate(&mut self, transition: &mut TransitionModel) -> AgentResult<ValidationOutcome> {
        if self.validation.is_empty() {
            return Ok(ValidationOutcome::Kept);
        }
        let live = reconstruction_rmse(&self.encoder, &self.decoder, &self.validation)?;
        let experimental = reconstruction_rmse(
            &self.encoder_experimental,
            &self.decoder_experimental,
            &self.validation,
        )?;
        self.settle(live, experimental, transition)
    }

    /// Applies the promotion rule to a pair of validation errors.
    pub fn settle(
        &mut self,
        live_error: f64,
        experimental_error: f64,
        transition: &mut TransitionModel,
    ) -> AgentResult<ValidationOutcome> {
        self.last_live_error = live_error;
        self.last_experimental_error = experimental_error;
        if experimental_error < PROMOTION_MARGIN * live_error {
            self.encoder.copy_weights_from(&self.encoder_experimental)?;
            self.decoder.copy_weights_from(&self.decoder_experimental)?;
            transition.reset_training_data();
            self.promotions += 1;
            log::debug!(
                "observation model promoted: rmse {live_error:.5} -> {experimental_error:.5}"
            );
            Ok(ValidationOutcome::Promoted)
        } else if live_error < PROMOTION_MARGIN * experimental_error {
            self.encoder_experimental.copy_weights_from(&self.encoder)?;
            self.decoder_experimental.copy_weights_from(&self.decoder)?;
            log::debug!(
                "observation model reverted: experimental rmse {experimental_error:.5} vs live {live_error:.5}"
            );
            Ok(ValidationOutcome::Reverted)
        } else {
            Ok(ValidationOutcome::Kept)
        }
    }

    /// Refines `beliefs` in place so the decoder reproduces `observations`.
    pub fn calibrate_beliefs(&mut self, beliefs: &mut [f64], observations: &[f64]) -> AgentResult<()> {
        check_len("calibrated beliefs", self.belief_dims, beliefs.len())?;
        check_len("calibration observations", self.observation_dims, observations.len())?;
        if let Some(tutor) = &self.tutor {
            let state = tutor.observations_to_state(observations);
            check_len("tutor state", self.belief_dims, state.len())?;
            beliefs.copy_from_slice(&state);
            return Ok(());
        }
        for _ in 0..self.calibration_iters {
            self.decoder
                .refine_inputs(beliefs, observations, self.learning_rate)?;
            clip(beliefs, -1.0, 1.0);
        }
        Ok(())
    }

    pub fn beliefs_to_observations(&mut self, beliefs: &[f64]) -> AgentResult<Vec<f64>> {
        if let Some(tutor) = &self.tutor {
            return Ok(tutor.state_to_observations(beliefs));
        }
        Ok(self.decoder.forward(beliefs)?.to_vec())
    }

    pub fn observations_to_beliefs(&mut self, observations: &[f64]) -> AgentResult<Vec<f64>> {
        if let Some(tutor) = &self.tutor {
            return Ok(tutor.observations_to_state(observations));
        }
        Ok(self.encoder.forward(observations)?.to_vec())
    }

    /// Side-effect-free [`observations_to_beliefs`](Self::observations_to_beliefs).
    pub fn encode(&self, observations: &[f64]) -> AgentResult<Vec<f64>> {
        if let Some(tutor) = &self.tutor {
            return Ok(tutor.observations_to_state(observations));
        }
        self.encoder.predict(observations)
    }
}

fn reconstruction_rmse(
    encoder: &NeuralNet,
    decoder: &NeuralNet,
    samples: &TrainingBuffer,
) -> AgentResult<f64> {
    let mut sum = 0.0;
    for (observation, _) in samples.iter() {
        let reconstructed = decoder.predict(&encoder.predict(observation)?)?;
        sum += squared_distance(observation, &reconstructed);
    }
    Ok((sum / samples.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::config::TransitionConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pair(rng: &mut StdRng) -> (ObservationModel, TransitionModel) {
        let config = ObservationConfig {
            capacity: 20,
            train_iters: 5,
            calibration_iters: 50,
            ..ObservationConfig::default()
        };
        let obs = ObservationModel::new(2, 2, &config, rng).unwrap();
        let tr = TransitionModel::new(2, 1, &TransitionConfig::default(), rng);
        (obs, tr)
    }

    #[test]
    fn test_rejects_more_beliefs_than_observations() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = ObservationModel::new(2, 3, &ObservationConfig::default(), &mut rng);
        assert!(matches!(result, Err(AgentError::InvalidDimensions(_))));
    }

    #[test]
    fn test_observations_alternate_between_buffers() {
        let mut rng = StdRng::seed_from_u64(1);
        let (mut obs, mut tr) = pair(&mut rng);
        for i in 0..6 {
            let v = f64::from(i) / 10.0;
            obs.train_incremental(&[v, -v], &mut tr, &mut rng).unwrap();
        }
        assert_eq!(obs.train_buffer().len(), 3);
        assert_eq!(obs.validation_buffer().len(), 3);
        assert_eq!(obs.train_buffer().input(0), &[0.0, 0.0]);
        assert_eq!(obs.validation_buffer().input(0), &[0.1, -0.1]);
    }

    #[test]
    fn test_settle_promotes_on_clear_improvement() {
        let mut rng = StdRng::seed_from_u64(2);
        let (mut obs, mut tr) = pair(&mut rng);
        for _ in 0..4 {
            tr.train_incremental(&[0.1, 0.2], &[0.5], &[0.2, 0.1], &mut rng)
                .unwrap();
        }
        assert_eq!(tr.train_size(), 4);

        let outcome = obs.settle(1.0, 0.5, &mut tr).unwrap();
        assert_eq!(outcome, ValidationOutcome::Promoted);
        assert_eq!(obs.promotions(), 1);
        assert_eq!(tr.train_size(), 0, "promotion must clear transition data");
        assert_eq!(tr.buffer().position(), 0);
    }

    #[test]
    fn test_settle_reverts_and_keeps() {
        let mut rng = StdRng::seed_from_u64(3);
        let (mut obs, mut tr) = pair(&mut rng);
        tr.train_incremental(&[0.1, 0.2], &[0.5], &[0.2, 0.1], &mut rng)
            .unwrap();

        assert_eq!(obs.settle(0.5, 1.0, &mut tr).unwrap(), ValidationOutcome::Reverted);
        assert_eq!(obs.settle(1.0, 0.9, &mut tr).unwrap(), ValidationOutcome::Kept);
        assert_eq!(obs.promotions(), 0);
        assert_eq!(tr.train_size(), 1, "no promotion, no reset");
    }

    #[test]
    fn test_validate_empty_set_keeps() {
        let mut rng = StdRng::seed_from_u64(4);
        let (mut obs, mut tr) = pair(&mut rng);
        assert_eq!(obs.validate(&mut tr).unwrap(), ValidationOutcome::Kept);
    }

    #[test]
    fn test_calibrate_keeps_beliefs_in_range() {
        let mut rng = StdRng::seed_from_u64(5);
        let (mut obs, _) = pair(&mut rng);
        let mut beliefs = vec![0.0, 0.0];
        obs.calibrate_beliefs(&mut beliefs, &[0.9, -0.9]).unwrap();
        assert!(beliefs.iter().all(|b| (-1.0..=1.0).contains(b)));
        assert!(obs.calibrate_beliefs(&mut beliefs, &[0.9]).is_err());
    }

    #[test]
    fn test_encode_matches_observations_to_beliefs() {
        let mut rng = StdRng::seed_from_u64(6);
        let (mut obs, _) = pair(&mut rng);
        let pure = obs.encode(&[0.3, 0.4]).unwrap();
        let stateful = obs.observations_to_beliefs(&[0.3, 0.4]).unwrap();
        assert_eq!(pure, stateful);
    }
}
