//! Tests for the learned models working together.

use manic_rust::simulation::config::{ObservationConfig, TransitionConfig};
use manic_rust::simulation::math::squared_distance;
use manic_rust::simulation::models::{ObservationModel, TransitionModel, ValidationOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn untrained_pair(rng: &mut StdRng) -> (ObservationModel, TransitionModel) {
    let config = ObservationConfig {
        capacity: 4,
        train_iters: 0,
        ..ObservationConfig::default()
    };
    let observation = ObservationModel::new(2, 2, &config, rng).unwrap();
    let transition = TransitionModel::new(2, 1, &TransitionConfig::default(), rng);
    (observation, transition)
}

#[test]
fn test_better_experimental_decoder_is_promoted() {
    let mut rng = StdRng::seed_from_u64(17);
    let (mut observation, mut transition) = untrained_pair(&mut rng);
    for _ in 0..4 {
        observation
            .train_incremental(&[-0.9, -0.9], &mut transition, &mut rng)
            .unwrap();
    }
    assert_eq!(observation.validation_buffer().len(), 2);

    for _ in 0..3 {
        transition
            .train_incremental(&[0.0, 0.0], &[0.5], &[0.1, 0.0], &mut rng)
            .unwrap();
    }
    assert_eq!(transition.train_size(), 3);

    // Live decoder always answers ~0.995, the experimental one exactly -0.9.
    let live = observation.decoder_mut().layer_mut(1).unwrap();
    live.weights_mut().fill(0.0);
    live.bias_mut().fill(3.0);
    let experimental = observation.decoder_experimental_mut().layer_mut(1).unwrap();
    experimental.weights_mut().fill(0.0);
    experimental.bias_mut().fill((-0.9_f64).atanh());

    let outcome = observation.validate(&mut transition).unwrap();
    assert_eq!(outcome, ValidationOutcome::Promoted);
    assert_eq!(observation.promotions(), 1);
    assert_eq!(transition.train_size(), 0, "Promotion clears transition data");
    let (live_err, experimental_err) = observation.last_errors();
    assert!(experimental_err < 0.85 * live_err);

    // Both pairs are now identical.
    let outcome = observation.validate(&mut transition).unwrap();
    assert_eq!(outcome, ValidationOutcome::Kept);
    assert_eq!(observation.promotions(), 1);
}

#[test]
fn test_worse_experimental_pair_is_reverted() {
    let mut rng = StdRng::seed_from_u64(18);
    let (mut observation, mut transition) = untrained_pair(&mut rng);
    for _ in 0..4 {
        observation
            .train_incremental(&[0.4, -0.2], &mut transition, &mut rng)
            .unwrap();
    }
    let experimental = observation.decoder_experimental_mut().layer_mut(1).unwrap();
    experimental.weights_mut().fill(0.0);
    experimental.bias_mut().fill(-5.0);
    let live = observation.decoder_mut().layer_mut(1).unwrap();
    live.weights_mut().fill(0.0);
    live.bias_mut().fill(0.0);

    assert_eq!(
        observation.validate(&mut transition).unwrap(),
        ValidationOutcome::Reverted
    );
    assert_eq!(observation.promotions(), 0);
    let (live_err, _) = observation.last_errors();
    let again = observation.validate(&mut transition).unwrap();
    assert_eq!(again, ValidationOutcome::Kept);
    assert!((observation.last_errors().1 - live_err).abs() < 1e-12);
}

#[test]
fn test_autoencoder_round_trip() {
    let mut rng = StdRng::seed_from_u64(23);
    let config = ObservationConfig {
        capacity: 50,
        train_iters: 50,
        ..ObservationConfig::default()
    };
    let mut observation = ObservationModel::new(2, 2, &config, &mut rng).unwrap();
    let mut transition = TransitionModel::new(2, 1, &TransitionConfig::default(), &mut rng);

    for _ in 0..1500 {
        let obs = [rng.random_range(-0.6..0.6), rng.random_range(-0.6..0.6)];
        observation
            .train_incremental(&obs, &mut transition, &mut rng)
            .unwrap();
    }
    assert!(observation.promotions() > 0, "Training should improve on the random init");

    let probes = [[0.3, -0.2], [-0.5, 0.1], [0.0, 0.4], [0.2, 0.2]];
    let mean_error = probes
        .iter()
        .map(|probe| {
            let beliefs = observation.observations_to_beliefs(probe).unwrap();
            let back = observation.beliefs_to_observations(&beliefs).unwrap();
            squared_distance(probe, &back).sqrt()
        })
        .sum::<f64>()
        / probes.len() as f64;
    assert!(mean_error < 0.25, "Round-trip error too large: {mean_error}");
}

#[test]
fn test_calibration_recovers_encoded_beliefs() {
    let mut rng = StdRng::seed_from_u64(29);
    let config = ObservationConfig {
        calibration_iters: 300,
        ..ObservationConfig::default()
    };
    let mut observation = ObservationModel::new(2, 2, &config, &mut rng).unwrap();

    let target_beliefs = [0.2, -0.3];
    let observations = observation.beliefs_to_observations(&target_beliefs).unwrap();
    let mut beliefs = vec![0.0, 0.0];
    let before = {
        let decoded = observation.beliefs_to_observations(&beliefs).unwrap();
        squared_distance(&decoded, &observations)
    };
    observation
        .calibrate_beliefs(&mut beliefs, &observations)
        .unwrap();
    let decoded = observation.beliefs_to_observations(&beliefs).unwrap();
    let after = squared_distance(&decoded, &observations);
    assert!(after < before, "Calibration must reduce the decoding error: {before} -> {after}");
}
