//! Fully connected layer with a fused tanh activation.
//!
//! Weights are stored input-major: `weights[[j, i]]` connects input `j`
//! to output `i`. Each layer keeps scratch vectors for its net input,
//! activation and error so a training step allocates nothing.

use crate::error::{check_len, AgentError, AgentResult};
use crate::simulation::math::{gaussian, rows};
use crate::simulation::params::MIN_INIT_DEVIATION;
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LayerParams", into = "LayerParams")]
pub struct Layer {
    weights: Array2<f64>,
    bias: Vec<f64>,
    net: Vec<f64>,
    activation: Vec<f64>,
    error: Vec<f64>,
}

/// Persisted form of a layer; scratch vectors are rebuilt on load.
#[derive(Serialize, Deserialize)]
struct LayerParams {
    #[serde(with = "rows")]
    weights: Array2<f64>,
    bias: Vec<f64>,
}

impl TryFrom<LayerParams> for Layer {
    type Error = String;

    fn try_from(params: LayerParams) -> Result<Self, Self::Error> {
        Self::from_parts(params.weights, params.bias).map_err(|e| e.to_string())
    }
}

impl From<Layer> for LayerParams {
    fn from(layer: Layer) -> Self {
        Self {
            weights: layer.weights,
            bias: layer.bias,
        }
    }
}

fn affine<'a>(
    weights: &Array2<f64>,
    bias: &[f64],
    input: impl Iterator<Item = &'a f64>,
    out: &mut [f64],
) {
    out.copy_from_slice(bias);
    for (x, w_row) in input.zip(weights.outer_iter()) {
        for (o, w) in out.iter_mut().zip(w_row.iter()) {
            *o += x * w;
        }
    }
}

impl Layer {
    /// Creates a zero-initialised layer.
    #[must_use]
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self {
            weights: Array2::zeros((inputs, outputs)),
            bias: vec![0.0; outputs],
            net: vec![0.0; outputs],
            activation: vec![0.0; outputs],
            error: vec![0.0; outputs],
        }
    }

    /// Builds a layer from explicit weights (`inputs x outputs`) and bias.
    pub fn from_parts(weights: Array2<f64>, bias: Vec<f64>) -> AgentResult<Self> {
        if weights.ncols() != bias.len() {
            return Err(AgentError::SizeMismatch {
                context: "layer bias",
                expected: weights.ncols(),
                got: bias.len(),
            });
        }
        let outputs = bias.len();
        // Re-layout so rows are always contiguous.
        let weights = Array2::from_shape_vec(weights.dim(), weights.iter().copied().collect())
            .map_err(|e| AgentError::InvalidDimensions(e.to_string()))?;
        Ok(Self {
            weights,
            bias,
            net: vec![0.0; outputs],
            activation: vec![0.0; outputs],
            error: vec![0.0; outputs],
        })
    }

    #[must_use]
    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    #[must_use]
    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    #[must_use]
    pub const fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut Array2<f64> {
        &mut self.weights
    }

    #[must_use]
    pub fn bias(&self) -> &[f64] {
        &self.bias
    }

    pub fn bias_mut(&mut self) -> &mut [f64] {
        &mut self.bias
    }

    #[must_use]
    pub fn activation(&self) -> &[f64] {
        &self.activation
    }

    #[must_use]
    pub fn error(&self) -> &[f64] {
        &self.error
    }

    pub(crate) fn error_mut(&mut self) -> &mut [f64] {
        &mut self.error
    }

    /// Draws weights and biases from N(0, max(0.3, 1/inputs)).
    pub fn init_weights(&mut self, rng: &mut impl Rng) {
        let dev = MIN_INIT_DEVIATION.max(1.0 / self.inputs().max(1) as f64);
        self.weights.mapv_inplace(|_| dev * gaussian(rng));
        for b in &mut self.bias {
            *b = dev * gaussian(rng);
        }
    }

    pub fn feed_forward(&mut self, input: &[f64]) -> AgentResult<()> {
        check_len("layer input", self.inputs(), input.len())?;
        affine(&self.weights, &self.bias, input.iter(), &mut self.net);
        self.activate();
        Ok(())
    }

    /// Feeds the concatenation `a ++ b` without building it.
    pub fn feed_forward2(&mut self, a: &[f64], b: &[f64]) -> AgentResult<()> {
        check_len("layer input", self.inputs(), a.len() + b.len())?;
        affine(&self.weights, &self.bias, a.iter().chain(b), &mut self.net);
        self.activate();
        Ok(())
    }

    fn activate(&mut self) {
        for (a, n) in self.activation.iter_mut().zip(&self.net) {
            *a = n.tanh();
        }
    }

    /// Stateless forward pass.
    pub fn project(&self, input: &[f64]) -> AgentResult<Vec<f64>> {
        check_len("layer input", self.inputs(), input.len())?;
        let mut out = vec![0.0; self.outputs()];
        affine(&self.weights, &self.bias, input.iter(), &mut out);
        for v in &mut out {
            *v = v.tanh();
        }
        Ok(out)
    }

    /// `error = target - activation`.
    pub fn compute_error(&mut self, target: &[f64]) -> AgentResult<()> {
        check_len("layer target", self.outputs(), target.len())?;
        for ((e, t), a) in self.error.iter_mut().zip(target).zip(&self.activation) {
            *e = t - a;
        }
        Ok(())
    }

    /// Scales the error by the tanh derivative at the current activation.
    pub fn deactivate(&mut self) {
        for (e, a) in self.error.iter_mut().zip(&self.activation) {
            *e *= 1.0 - a * a;
        }
    }

    /// Writes `W · error` into the upstream layer's error vector.
    pub fn feed_back(&self, upstream: &mut [f64]) {
        debug_assert_eq!(upstream.len(), self.inputs());
        for (u, w_row) in upstream.iter_mut().zip(self.weights.outer_iter()) {
            *u = w_row.iter().zip(&self.error).map(|(w, e)| w * e).sum();
        }
    }

    /// Moves `inputs` along the error gradient instead of the weights.
    pub fn refine_inputs(&self, inputs: &mut [f64], learning_rate: f64) -> AgentResult<()> {
        check_len("refined inputs", self.inputs(), inputs.len())?;
        for (x, w_row) in inputs.iter_mut().zip(self.weights.outer_iter()) {
            let g: f64 = w_row.iter().zip(&self.error).map(|(w, e)| w * e).sum();
            *x += learning_rate * g;
        }
        Ok(())
    }

    /// One gradient step on weights and bias, given the input this layer last saw.
    pub fn update_weights(&mut self, input: &[f64], learning_rate: f64) {
        for (b, e) in self.bias.iter_mut().zip(&self.error) {
            *b += learning_rate * e;
        }
        for (x, mut w_row) in input.iter().zip(self.weights.outer_iter_mut()) {
            for (w, e) in w_row.iter_mut().zip(&self.error) {
                *w += learning_rate * x * e;
            }
        }
    }

    /// Shrinks every parameter towards zero by a factor and a constant.
    pub fn regularize_weights(&mut self, lambda: f64) {
        let shrink = |w: f64| {
            let w = w * (1.0 - lambda);
            if w < 0.0 {
                w + lambda
            } else {
                w - lambda
            }
        };
        self.weights.mapv_inplace(shrink);
        for b in &mut self.bias {
            *b = shrink(*b);
        }
    }

    /// Copies parameters from a layer of identical shape.
    pub fn copy_from(&mut self, other: &Self) -> AgentResult<()> {
        check_len("copied layer inputs", self.inputs(), other.inputs())?;
        check_len("copied layer outputs", self.outputs(), other.outputs())?;
        self.weights.assign(&other.weights);
        self.bias.copy_from_slice(&other.bias);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_feed_forward_applies_tanh() {
        let mut layer = Layer::from_parts(array![[1.0], [2.0]], vec![0.5]).unwrap();
        layer.feed_forward(&[0.1, 0.2]).unwrap();
        let expected = (0.5_f64 + 0.1 + 0.4).tanh();
        assert!((layer.activation()[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_feed_forward2_matches_concatenation() {
        let weights = array![[0.1, -0.2], [0.3, 0.4], [-0.5, 0.6]];
        let mut a = Layer::from_parts(weights.clone(), vec![0.0, 0.1]).unwrap();
        let mut b = Layer::from_parts(weights, vec![0.0, 0.1]).unwrap();
        a.feed_forward(&[0.2, -0.4, 0.9]).unwrap();
        b.feed_forward2(&[0.2], &[-0.4, 0.9]).unwrap();
        assert_eq!(a.activation(), b.activation());
    }

    #[test]
    fn test_wrong_input_width_is_rejected() {
        let mut layer = Layer::new(3, 2);
        assert!(layer.feed_forward(&[0.0, 0.0]).is_err());
        assert!(layer.project(&[0.0; 4]).is_err());
    }

    #[test]
    fn test_from_parts_rejects_bias_mismatch() {
        assert!(Layer::from_parts(array![[1.0, 2.0]], vec![0.0]).is_err());
    }

    #[test]
    fn test_regularize_shrinks_towards_zero() {
        let mut layer = Layer::from_parts(array![[1.0, -1.0]], vec![0.5, -0.5]).unwrap();
        layer.regularize_weights(0.1);
        // w * 0.9 then step 0.1 towards zero
        assert!((layer.weights()[[0, 0]] - 0.8).abs() < 1e-12);
        assert!((layer.weights()[[0, 1]] + 0.8).abs() < 1e-12);
        assert!((layer.bias()[0] - 0.35).abs() < 1e-12);
        assert!((layer.bias()[1] + 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_init_weights_deviation() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        let mut rng = StdRng::seed_from_u64(11);
        let mut layer = Layer::new(100, 50);
        layer.init_weights(&mut rng);
        let n = layer.weights().len() as f64;
        let var = layer.weights().iter().map(|w| w * w).sum::<f64>() / n;
        // dev = max(0.3, 1/100) = 0.3
        assert!((var.sqrt() - 0.3).abs() < 0.02, "std was {}", var.sqrt());
    }

    #[test]
    fn test_serde_rebuilds_scratch() {
        let layer = Layer::from_parts(array![[0.1, 0.2], [0.3, 0.4]], vec![0.0, -0.1]).unwrap();
        let json = serde_json::to_string(&layer).unwrap();
        let mut back: Layer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.weights(), layer.weights());
        assert_eq!(back.activation().len(), 2);
        back.feed_forward(&[1.0, 1.0]).unwrap();
    }
}
