//! External sources of judgement: the mentor that scores anticipated
//! observations, and the tutor that can stand in for any learned model.

use std::fmt::Debug;

/// Scores how desirable an anticipated observation is.
pub trait Mentor: Send + Debug {
    /// Returns a score in `[0, 1]` (1 is best), or `None` to abstain.
    fn evaluate(&mut self, anticipated_observations: &[f64]) -> Option<f64>;
}

/// Ground-truth oracle used to isolate a failing model while debugging.
///
/// Each model consults the tutor instead of its own network when the
/// corresponding [`TutorFlags`] switch is on.
pub trait Tutor: Send + Sync + Debug {
    fn observations_to_state(&self, observations: &[f64]) -> Vec<f64>;
    fn state_to_observations(&self, state: &[f64]) -> Vec<f64>;
    fn transition(&self, state: &[f64], actions: &[f64], next_state: &mut [f64]);
    fn evaluate_state(&self, state: &[f64]) -> f64;
    fn choose_actions(&self, state: &[f64], actions: &mut [f64]);
}

/// Which models defer to the tutor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TutorFlags {
    pub observation: bool,
    pub transition: bool,
    pub contentment: bool,
    pub planning: bool,
}

impl TutorFlags {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            observation: true,
            transition: true,
            contentment: true,
            planning: true,
        }
    }

    #[must_use]
    pub const fn none() -> Self {
        Self {
            observation: false,
            transition: false,
            contentment: false,
            planning: false,
        }
    }
}
