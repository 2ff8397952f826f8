//! Feed-forward network of tanh layers trained by online backpropagation.

use super::layer::Layer;
use crate::error::{check_len, AgentError, AgentResult};
use crate::simulation::params::REGULARIZATION_SCALE;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// An ordered stack of [`Layer`]s where each layer's output width equals
/// the next layer's input width.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeuralNet {
    layers: Vec<Layer>,
}

impl NeuralNet {
    /// Creates an empty network.
    #[must_use]
    pub const fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Builds a network with the given layer widths, e.g. `[in, hidden, out]`,
    /// and randomises its weights.
    #[must_use]
    pub fn with_topology(widths: &[usize], rng: &mut impl Rng) -> Self {
        let mut net = Self::new();
        net.layers = widths
            .windows(2)
            .map(|pair| Layer::new(pair[0], pair[1]))
            .collect();
        net.init(rng);
        net
    }

    /// Appends a layer, rejecting one whose input width breaks the chain.
    pub fn push_layer(&mut self, layer: Layer) -> AgentResult<()> {
        if let Some(last) = self.layers.last() {
            check_len("appended layer", last.outputs(), layer.inputs())?;
        }
        self.layers.push(layer);
        Ok(())
    }

    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    #[must_use]
    pub fn input_count(&self) -> usize {
        self.layers.first().map_or(0, Layer::inputs)
    }

    #[must_use]
    pub fn output_count(&self) -> usize {
        self.layers.last().map_or(0, Layer::outputs)
    }

    /// Activation of the last layer from the most recent forward pass.
    #[must_use]
    pub fn output(&self) -> &[f64] {
        self.layers.last().map_or(&[][..], Layer::activation)
    }

    pub fn init(&mut self, rng: &mut impl Rng) {
        for layer in &mut self.layers {
            layer.init_weights(rng);
        }
    }

    /// Checks that the network maps `inputs` to `outputs` through a
    /// consistent chain of layers.
    pub fn check_shape(&self, context: &'static str, inputs: usize, outputs: usize) -> AgentResult<()> {
        self.require_layers()?;
        check_len(context, inputs, self.input_count())?;
        check_len(context, outputs, self.output_count())?;
        for pair in self.layers.windows(2) {
            check_len(context, pair[0].outputs(), pair[1].inputs())?;
        }
        Ok(())
    }

    fn require_layers(&self) -> AgentResult<()> {
        if self.layers.is_empty() {
            Err(AgentError::InvalidDimensions("network has no layers".into()))
        } else {
            Ok(())
        }
    }

    fn forward_rest(&mut self) -> AgentResult<()> {
        for i in 1..self.layers.len() {
            let (done, rest) = self.layers.split_at_mut(i);
            rest[0].feed_forward(done[i - 1].activation())?;
        }
        Ok(())
    }

    pub fn forward(&mut self, input: &[f64]) -> AgentResult<&[f64]> {
        self.require_layers()?;
        self.layers[0].feed_forward(input)?;
        self.forward_rest()?;
        Ok(self.output())
    }

    /// Forward pass on the concatenation `a ++ b`.
    pub fn forward2(&mut self, a: &[f64], b: &[f64]) -> AgentResult<&[f64]> {
        self.require_layers()?;
        self.layers[0].feed_forward2(a, b)?;
        self.forward_rest()?;
        Ok(self.output())
    }

    /// Forward pass that leaves the scratch state untouched.
    pub fn predict(&self, input: &[f64]) -> AgentResult<Vec<f64>> {
        self.require_layers()?;
        let mut signal = input.to_vec();
        for layer in &self.layers {
            signal = layer.project(&signal)?;
        }
        Ok(signal)
    }

    fn propagate_down(&mut self) {
        for i in (0..self.layers.len().saturating_sub(1)).rev() {
            let (head, tail) = self.layers.split_at_mut(i + 1);
            tail[0].feed_back(head[i].error_mut());
            head[i].deactivate();
        }
    }

    /// Computes every layer's error for `target` after a forward pass.
    pub fn backward(&mut self, target: &[f64]) -> AgentResult<()> {
        self.require_layers()?;
        if let Some(last) = self.layers.last_mut() {
            last.compute_error(target)?;
            last.deactivate();
        }
        self.propagate_down();
        Ok(())
    }

    /// Backpropagates from the first layer of `decoder`, whose input is this
    /// network's output. Used when this network is an encoder.
    pub fn backward_from(&mut self, decoder: &Self) -> AgentResult<()> {
        self.require_layers()?;
        let first = decoder
            .layers
            .first()
            .ok_or_else(|| AgentError::InvalidDimensions("decoder has no layers".into()))?;
        check_len("decoder input", self.output_count(), first.inputs())?;
        if let Some(last) = self.layers.last_mut() {
            first.feed_back(last.error_mut());
            last.deactivate();
        }
        self.propagate_down();
        Ok(())
    }

    /// Gradient step on every layer after `backward`; `input` is the
    /// input of the preceding forward pass.
    pub fn update_weights(&mut self, input: &[f64], learning_rate: f64) -> AgentResult<()> {
        check_len("update input", self.input_count(), input.len())?;
        for i in 0..self.layers.len() {
            let (done, rest) = self.layers.split_at_mut(i);
            let upstream = done.last().map_or(input, Layer::activation);
            rest[0].update_weights(upstream, learning_rate);
        }
        Ok(())
    }

    /// Shrinks all parameters by `0.1 * rate * lambda`.
    pub fn regularize(&mut self, rate: f64, lambda: f64) {
        let amount = REGULARIZATION_SCALE * rate * lambda;
        for layer in &mut self.layers {
            layer.regularize_weights(amount);
        }
    }

    /// One online SGD step: forward, backward, update.
    pub fn train_incremental(
        &mut self,
        input: &[f64],
        target: &[f64],
        learning_rate: f64,
    ) -> AgentResult<()> {
        self.forward(input)?;
        self.backward(target)?;
        self.update_weights(input, learning_rate)
    }

    /// Adjusts `input` so that the output moves towards `target`.
    /// Weights are not modified.
    pub fn refine_inputs(
        &mut self,
        input: &mut [f64],
        target: &[f64],
        learning_rate: f64,
    ) -> AgentResult<()> {
        self.forward(input)?;
        self.backward(target)?;
        self.layers[0].refine_inputs(input, learning_rate)
    }

    /// Copies all parameters from a network with identical topology.
    pub fn copy_weights_from(&mut self, other: &Self) -> AgentResult<()> {
        check_len("copied layer count", self.layers.len(), other.layers.len())?;
        for (dst, src) in self.layers.iter_mut().zip(&other.layers) {
            dst.copy_from(src)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// 2-3-2 network with hand-picked weights.
    fn fixture() -> NeuralNet {
        let mut net = NeuralNet::new();
        net.push_layer(
            Layer::from_parts(
                array![[0.1, 0.0, 0.1], [0.1, 0.0, -0.1]],
                vec![0.1, 0.1, 0.0],
            )
            .unwrap(),
        )
        .unwrap();
        net.push_layer(
            Layer::from_parts(
                array![[0.1, 0.1], [0.1, 0.3], [0.1, -0.1]],
                vec![0.1, -0.2],
            )
            .unwrap(),
        )
        .unwrap();
        net
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_forward_fixture() {
        let mut net = fixture();
        let out = net.forward(&[0.3, -0.2]).unwrap().to_vec();
        assert!(close(net.layers()[0].activation()[0], 0.109_558_470_214_429_53));
        assert!(close(net.layers()[0].activation()[1], 0.099_667_994_624_955_82));
        assert!(close(net.layers()[0].activation()[2], 0.049_958_374_957_879_98));
        assert!(close(out[0], 0.125_257_179_093_040_5));
        assert!(close(out[1], -0.162_681_234_060_348_68));
    }

    #[test]
    fn test_train_incremental_fixture() {
        let mut net = fixture();
        net.train_incremental(&[0.3, -0.2], &[0.1, 0.0], 0.1).unwrap();

        let l0 = &net.layers()[0];
        let l1 = &net.layers()[1];
        assert!(close(l0.weights()[[0, 0]], 0.100_395_737_042_869_12));
        assert!(close(l0.weights()[[0, 1]], 0.001_337_381_424_144_603_5));
        assert!(close(l0.bias()[1], 0.104_457_938_080_482_01));
        assert!(close(l1.bias()[0], 0.097_513_908_990_542_85));
        assert!(close(l1.bias()[1], -0.184_162_415_471_864_24));
        assert!(close(l1.weights()[[1, 1]], 0.301_578_500_289_622_5));
    }

    #[test]
    fn test_predict_matches_forward_without_side_effects() {
        let mut net = fixture();
        let predicted = net.predict(&[0.3, -0.2]).unwrap();
        assert!(net.output().iter().all(|&v| v == 0.0), "predict must not touch scratch");
        let forwarded = net.forward(&[0.3, -0.2]).unwrap().to_vec();
        assert_eq!(predicted, forwarded);
    }

    #[test]
    fn test_check_shape() {
        let net = fixture();
        assert!(net.check_shape("net", 2, 2).is_ok());
        assert!(net.check_shape("net", 3, 2).is_err());
        assert!(net.check_shape("net", 2, 1).is_err());
        assert!(NeuralNet::new().check_shape("net", 0, 0).is_err());
    }

    #[test]
    fn test_push_layer_rejects_broken_chain() {
        let mut net = NeuralNet::new();
        net.push_layer(Layer::new(2, 3)).unwrap();
        assert!(net.push_layer(Layer::new(4, 1)).is_err());
        assert_eq!(net.layers().len(), 1);
    }

    #[test]
    fn test_empty_network_errors() {
        let mut net = NeuralNet::new();
        assert!(net.forward(&[1.0]).is_err());
        assert!(net.predict(&[1.0]).is_err());
    }

    #[test]
    fn test_refine_inputs_reduces_error() {
        let mut net = fixture();
        let target = [0.3, 0.1];
        let mut input = vec![0.0, 0.0];
        let before = {
            let out = net.predict(&input).unwrap();
            (out[0] - target[0]).powi(2) + (out[1] - target[1]).powi(2)
        };
        let weights_before = net.layers()[0].weights().clone();
        for _ in 0..200 {
            net.refine_inputs(&mut input, &target, 0.1).unwrap();
        }
        let out = net.predict(&input).unwrap();
        let after = (out[0] - target[0]).powi(2) + (out[1] - target[1]).powi(2);
        assert!(after < before, "error should shrink: {before} -> {after}");
        assert_eq!(net.layers()[0].weights(), &weights_before);
    }

    #[test]
    fn test_learns_simple_mapping() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut net = NeuralNet::with_topology(&[1, 8, 1], &mut rng);
        let f = |x: f64| 0.5 * x;
        for _ in 0..5000 {
            let x = rng.random_range(-1.0..1.0);
            net.train_incremental(&[x], &[f(x)], 0.05).unwrap();
        }
        let err: f64 = [-0.8, -0.3, 0.2, 0.7]
            .iter()
            .map(|&x| (net.predict(&[x]).unwrap()[0] - f(x)).abs())
            .fold(0.0, f64::max);
        assert!(err < 0.1, "max abs error too large: {err}");
    }

    #[test]
    fn test_copy_weights_from() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = NeuralNet::with_topology(&[2, 4, 2], &mut rng);
        let mut b = NeuralNet::with_topology(&[2, 4, 2], &mut rng);
        b.copy_weights_from(&a).unwrap();
        assert_eq!(a.predict(&[0.1, 0.2]).unwrap(), b.predict(&[0.1, 0.2]).unwrap());

        let mut c = NeuralNet::with_topology(&[2, 3, 2], &mut rng);
        assert!(c.copy_weights_from(&a).is_err());
    }
}
