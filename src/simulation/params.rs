//! Agent hyperparameters.

use std::f64::consts::PI;

// Shared learning rate for every learned model.
pub const LEARNING_RATE: f64 = 0.03;
pub const MIN_HIDDEN_UNITS: usize = 30;
pub const MIN_INIT_DEVIATION: f64 = 0.3;
pub const REGULARIZATION_SCALE: f64 = 0.1;

// Transition model
pub const TRANSITION_MEMORY: usize = 500;
pub const TRANSITION_TRAIN_ITERS: usize = 1000;
pub const TRANSITION_ITERS_PER_SAMPLE: usize = 100;
pub const TRANSITION_REGULARIZATION: f64 = 1e-7;

// Observation model
pub const OBSERVATION_MEMORY: usize = 500;
pub const OBSERVATION_TRAIN_ITERS: usize = 50;
pub const CALIBRATION_ITERS: usize = 500;
pub const OBSERVATION_REGULARIZATION: f64 = 1e-5;
pub const PROMOTION_MARGIN: f64 = 0.85;

// Contentment model
pub const CONTENTMENT_MEMORY: usize = 500;
pub const CONTENTMENT_TRAIN_ITERS: usize = 50;
pub const CONTENTMENT_MAX_HIDDEN: usize = 30;
pub const CONTENTMENT_HIDDEN_PER_BELIEF: usize = 10;
pub const CONTENTMENT_REGULARIZATION: f64 = 1e-6;

// Planning
pub const POPULATION_SIZE: usize = 30;
pub const REFINEMENT_ITERS_PER_MEMBER: usize = 50;
pub const BURN_IN: usize = 500;
pub const DISCOUNT_FACTOR: f64 = 0.99;
pub const EXPLORATION_RATE: f64 = 0.0;
pub const MUTATE_PROB: f64 = 0.65;
pub const RANDOM_WINNER_PROB: f64 = 0.3;

// Mutation kinds, as cumulative thresholds on one uniform draw
pub const LENGTHEN_THRESHOLD: f64 = 0.1;
pub const SHORTEN_THRESHOLD: f64 = 0.2;
pub const ELEMENT_THRESHOLD: f64 = 0.7;
pub const VECTOR_THRESHOLD: f64 = 0.9;
pub const ELEMENT_SIGMA: f64 = 0.03;
pub const VECTOR_SIGMA: f64 = 0.02;
pub const PLAN_SIGMA: f64 = 0.01;

// Replacement kinds, cumulative
pub const CLONE_THRESHOLD: f64 = 0.2;
pub const CROSSOVER_THRESHOLD: f64 = 0.7;
pub const MAX_BLEND: f64 = 2.0;

// Drifting platform
pub const DRIFT_SPEED: f64 = 0.1;
pub const STEP_SIZE: f64 = 0.05;
pub const CONTROL_ROTATION: f64 = 2.0 * PI / 3.0;
pub const SUPERVISED_STEPS: u64 = 2000;
pub const UNSUPERVISED_STEPS: u64 = 2000;
pub const TESTING_STEPS: u64 = 1000;
