//! Fixed-capacity circular store of training pairs.

use crate::error::{check_len, AgentError, AgentResult};
use crate::simulation::math::rows;
use ndarray::{Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A fixed-capacity circular buffer of `(input, target)` row pairs.
///
/// The write cursor wraps to 0 at capacity and overwrites the oldest pair.
/// The size grows up to capacity and only shrinks through [`reset`](Self::reset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingBuffer {
    #[serde(with = "rows")]
    inputs: Array2<f64>,
    #[serde(with = "rows")]
    targets: Array2<f64>,
    pos: usize,
    size: usize,
}

impl TrainingBuffer {
    /// Creates an empty buffer with room for `capacity` pairs.
    #[must_use]
    pub fn new(capacity: usize, input_dims: usize, target_dims: usize) -> Self {
        Self {
            inputs: Array2::zeros((capacity, input_dims)),
            targets: Array2::zeros((capacity, target_dims)),
            pos: 0,
            size: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inputs.nrows()
    }

    #[must_use]
    pub fn input_dims(&self) -> usize {
        self.inputs.ncols()
    }

    #[must_use]
    pub fn target_dims(&self) -> usize {
        self.targets.ncols()
    }

    /// Number of valid pairs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Index the next pair will be written to.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Stores a pair, overwriting the oldest one once full.
    pub fn push(&mut self, input: &[f64], target: &[f64]) -> AgentResult<()> {
        check_len("buffer input", self.input_dims(), input.len())?;
        check_len("buffer target", self.target_dims(), target.len())?;
        if self.capacity() == 0 {
            return Ok(());
        }
        self.inputs.row_mut(self.pos).assign(&ArrayView1::from(input));
        self.targets.row_mut(self.pos).assign(&ArrayView1::from(target));
        self.pos += 1;
        self.size = self.size.max(self.pos);
        if self.pos >= self.capacity() {
            self.pos = 0;
        }
        Ok(())
    }

    /// Input row `index`.
    #[must_use]
    pub fn input(&self, index: usize) -> &[f64] {
        self.inputs.row(index).to_slice().unwrap_or(&[])
    }

    /// Target row `index`.
    #[must_use]
    pub fn target(&self, index: usize) -> &[f64] {
        self.targets.row(index).to_slice().unwrap_or(&[])
    }

    /// Uniformly picks the index of a valid pair, or `None` when empty.
    pub fn sample_index(&self, rng: &mut impl Rng) -> Option<usize> {
        (self.size > 0).then(|| rng.random_range(0..self.size))
    }

    /// Iterates valid `(input, target)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&[f64], &[f64])> {
        (0..self.size).map(move |i| (self.input(i), self.target(i)))
    }

    /// Forgets every pair.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.size = 0;
    }

    /// Checks the row widths and that the cursor and size are consistent
    /// with the capacity. Used on restored snapshots.
    pub fn validate(
        &self,
        context: &'static str,
        input_dims: usize,
        target_dims: usize,
    ) -> AgentResult<()> {
        check_len(context, input_dims, self.input_dims())?;
        check_len(context, target_dims, self.target_dims())?;
        let capacity = self.capacity();
        check_len(context, capacity, self.targets.nrows())?;
        if self.size > capacity || self.pos > self.size || (capacity > 0 && self.pos >= capacity) {
            return Err(AgentError::InvalidDimensions(format!(
                "{context}: cursor {} and size {} do not fit capacity {capacity}",
                self.pos, self.size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_push_and_len() {
        let mut buf = TrainingBuffer::new(4, 2, 1);
        assert!(buf.is_empty());

        buf.push(&[0.1, 0.2], &[1.0]).unwrap();
        assert_eq!(buf.len(), 1);
        buf.push(&[0.3, 0.4], &[2.0]).unwrap();
        buf.push(&[0.5, 0.6], &[3.0]).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.position(), 3);
    }

    #[test]
    fn test_overflow_overwrites_oldest() {
        let mut buf = TrainingBuffer::new(3, 1, 1);
        for i in 0..4 {
            let v = f64::from(i);
            buf.push(&[v], &[v * 10.0]).unwrap();
        }

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.position(), 1);
        assert_eq!(buf.input(0), &[3.0]);
        assert_eq!(buf.target(0), &[30.0]);
        assert_eq!(buf.input(1), &[1.0]);
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let mut buf = TrainingBuffer::new(5, 1, 0);
        for i in 0..23 {
            buf.push(&[f64::from(i)], &[]).unwrap();
            assert!(buf.len() <= buf.capacity());
            assert!(buf.position() < buf.capacity());
        }
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_push_rejects_wrong_width() {
        let mut buf = TrainingBuffer::new(3, 2, 1);
        assert!(buf.push(&[0.1], &[0.0]).is_err());
        assert!(buf.push(&[0.1, 0.2], &[]).is_err());
        assert!(buf.is_empty(), "Rejected pair must not be stored");
    }

    #[test]
    fn test_sample_index_within_size() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut buf = TrainingBuffer::new(10, 1, 1);
        assert!(buf.sample_index(&mut rng).is_none());

        buf.push(&[1.0], &[1.0]).unwrap();
        buf.push(&[2.0], &[2.0]).unwrap();
        for _ in 0..100 {
            let i = buf.sample_index(&mut rng).unwrap();
            assert!(i < 2);
        }
    }

    #[test]
    fn test_iter_and_reset() {
        let mut buf = TrainingBuffer::new(4, 1, 1);
        buf.push(&[1.0], &[-1.0]).unwrap();
        buf.push(&[2.0], &[-2.0]).unwrap();

        let collected: Vec<_> = buf.iter().map(|(i, t)| (i[0], t[0])).collect();
        assert_eq!(collected, vec![(1.0, -1.0), (2.0, -2.0)]);

        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.iter().count(), 0);
    }

    #[test]
    fn test_validate_checks_cursor_and_widths() {
        let mut buf = TrainingBuffer::new(3, 2, 1);
        buf.push(&[0.1, 0.2], &[1.0]).unwrap();
        assert!(buf.validate("buffer", 2, 1).is_ok());
        assert!(buf.validate("buffer", 3, 1).is_err());
        assert!(buf.validate("buffer", 2, 0).is_err());

        buf.pos = 3;
        assert!(buf.validate("buffer", 2, 1).is_err());
        buf.pos = 1;
        buf.size = 4;
        assert!(buf.validate("buffer", 2, 1).is_err());
    }
}
