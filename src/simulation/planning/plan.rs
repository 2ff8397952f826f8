//! A candidate course of action.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Ordered sequence of action vectors, each component in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<Vec<f64>>,
}

impl Plan {
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    #[must_use]
    pub const fn from_steps(steps: Vec<Vec<f64>>) -> Self {
        Self { steps }
    }

    /// A plan of `len` uniformly random actions.
    #[must_use]
    pub fn random(len: usize, action_dims: usize, rng: &mut impl Rng) -> Self {
        let steps = (0..len).map(|_| random_action(action_dims, rng)).collect();
        Self { steps }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn steps(&self) -> &[Vec<f64>] {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut Vec<Vec<f64>> {
        &mut self.steps
    }

    /// The action to perform now.
    #[must_use]
    pub fn first(&self) -> Option<&[f64]> {
        self.steps.first().map(Vec::as_slice)
    }

    /// Moves the first action to the end; the time step it covered has passed.
    pub fn rotate(&mut self) {
        if !self.steps.is_empty() {
            self.steps.rotate_left(1);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.steps.iter().map(Vec::as_slice)
    }
}

/// A vector of uniform draws in `[0, 1)`.
pub fn random_action(action_dims: usize, rng: &mut impl Rng) -> Vec<f64> {
    (0..action_dims).map(|_| rng.random::<f64>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_plan_shape() {
        let mut rng = StdRng::seed_from_u64(5);
        let plan = Plan::random(4, 3, &mut rng);
        assert_eq!(plan.len(), 4);
        assert!(plan.iter().all(|a| a.len() == 3));
        assert!(plan.iter().flatten().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_rotate_moves_first_to_end() {
        let mut plan = Plan::from_steps(vec![vec![0.1], vec![0.2], vec![0.3]]);
        plan.rotate();
        assert_eq!(plan.steps(), &[vec![0.2], vec![0.3], vec![0.1]]);
        assert_eq!(plan.first(), Some(&[0.2][..]));
    }

    #[test]
    fn test_rotate_empty_is_noop() {
        let mut plan = Plan::new();
        plan.rotate();
        assert!(plan.is_empty());
        assert!(plan.first().is_none());
    }
}
