use crate::error::{DnnError, Result};
use crate::network::Network;
use log::trace;
use ndarray::{Array2, ArrayView2, Axis};

/// Per-layer gradients of the loss, in the same order as the network's layers.
#[derive(Debug, Clone)]
pub struct Gradients {
    weights: Vec<Array2<f64>>,
    biases: Vec<Array2<f64>>,
}

impl Gradients {
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[Array2<f64>] {
        &self.weights
    }

    pub fn biases(&self) -> &[Array2<f64>] {
        &self.biases
    }
}

impl Network {
    /// Computes the gradient of the cross-entropy loss with respect to every weight matrix and bias
    /// vector, averaged over the `m` rows of the batch.
    ///
    /// The output layer's error signal is `output - targets`, the closed form for softmax followed
    /// by cross-entropy. Each earlier layer receives the later error projected back through the
    /// later layer's weights, scaled by its own activation's derivative evaluated at its cached
    /// output.
    pub fn gradients(
        &self,
        inputs: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
    ) -> Result<Gradients> {
        let m = inputs.nrows();
        if m == 0 {
            return Err(DnnError::EmptyBatch {
                what: "backpropagation batch",
            });
        }
        let expected = (m, self.output_dim());
        if targets.dim() != expected {
            return Err(DnnError::shape("backpropagation targets", targets.dim(), expected));
        }

        let cache = self.forward_full(inputs)?;
        let activations = cache.as_slice();
        let layers = self.layers();
        let scale = 1.0 / m as f64;

        let mut weights = Vec::with_capacity(layers.len());
        let mut biases = Vec::with_capacity(layers.len());
        // Softmax followed by cross-entropy: the output error is simply p - y.
        let mut delta = cache.output() - &targets;

        // Layer l maps cache[l] to cache[l + 1].
        for l in (0..layers.len()).rev() {
            let previous = &activations[l];
            // dW = deltaᵀ · a_prev / m and db = column sums of delta / m.
            weights.push(delta.t().dot(previous) * scale);
            biases.push(delta.sum_axis(Axis(0)).insert_axis(Axis(0)) * scale);

            // Push the error back through W_l, gated by layer l - 1's own derivative.
            if l > 0 {
                let local = layers[l - 1].activation().derivative_from_output(previous);
                delta = delta.dot(layers[l].weights()) * &local;
            }
        }

        weights.reverse();
        biases.reverse();
        Ok(Gradients { weights, biases })
    }

    /// Applies `W <- W - lr * dW` and `b <- b - lr * db` to every layer. Every shape is checked
    /// before the first parameter is touched, so a rejected update leaves the network unchanged.
    /// `learning_rate` must be finite and non-negative.
    pub fn apply_gradients(&mut self, gradients: &Gradients, learning_rate: f64) -> Result<()> {
        if !(learning_rate.is_finite() && learning_rate >= 0.0) {
            return Err(DnnError::InvalidConfig(format!(
                "learning_rate must be finite and non-negative, got {learning_rate}"
            )));
        }
        if gradients.len() != self.depth() {
            return Err(DnnError::shape(
                "gradient count",
                (gradients.len(), 1),
                (self.depth(), 1),
            ));
        }
        for ((layer, dw), db) in self
            .layers()
            .iter()
            .zip(&gradients.weights)
            .zip(&gradients.biases)
        {
            if dw.dim() != layer.weights().dim() {
                return Err(DnnError::shape("weight gradient", dw.dim(), layer.weights().dim()));
            }
            if db.dim() != layer.biases().dim() {
                return Err(DnnError::shape("bias gradient", db.dim(), layer.biases().dim()));
            }
        }

        for ((layer, dw), db) in self
            .layers_mut()
            .iter_mut()
            .zip(&gradients.weights)
            .zip(&gradients.biases)
        {
            let (weights, biases) = layer.params_mut();
            weights.scaled_add(-learning_rate, dw);
            biases.scaled_add(-learning_rate, db);
        }
        Ok(())
    }

    /// One gradient-descent step on a single batch. Gradients for all layers are computed against
    /// the current weights before any of them is updated.
    pub fn backpropagation(
        &mut self,
        inputs: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
        learning_rate: f64,
    ) -> Result<()> {
        let gradients = self.gradients(inputs, targets)?;
        trace!("applying gradients for a batch of {} rows", inputs.nrows());
        self.apply_gradients(&gradients, learning_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::layer::Layer;
    use crate::metrics::compute_loss;
    use crate::network::FineTunePolicy;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::rand::{SeedableRng, rngs::StdRng};

    fn categorical_loss(network: &Network, x: &Array2<f64>, y: &Array2<f64>) -> f64 {
        let p = network.forward(x.view()).unwrap();
        -(y * &p.mapv(f64::ln)).sum() / x.nrows() as f64
    }

    fn tiny_network(hidden: Activation) -> Network {
        let mut rng = StdRng::seed_from_u64(42);
        let layers = vec![
            Layer::random(3, 4, hidden, 0.5, &mut rng),
            Layer::random(4, 2, hidden, 0.5, &mut rng),
        ];
        Network::from_layers(layers, FineTunePolicy::default()).unwrap()
    }

    fn batch() -> (Array2<f64>, Array2<f64>) {
        (
            array![[0.5, -1.0, 0.25], [1.0, 0.0, -0.5], [-0.3, 0.8, 0.1]],
            array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]],
        )
    }

    #[test]
    fn gradients_have_parameter_shapes() {
        let network = tiny_network(Activation::Sigmoid);
        let (x, y) = batch();
        let gradients = network.gradients(x.view(), y.view()).unwrap();
        assert_eq!(gradients.len(), 2);
        for (layer, (dw, db)) in network
            .layers()
            .iter()
            .zip(gradients.weights().iter().zip(gradients.biases()))
        {
            assert_eq!(dw.dim(), layer.weights().dim());
            assert_eq!(db.dim(), layer.biases().dim());
        }
    }

    #[test]
    fn unusable_learning_rate_is_rejected_without_touching_weights() {
        let mut network = tiny_network(Activation::Sigmoid);
        let before = network.clone();
        let (x, y) = batch();
        for learning_rate in [f64::NAN, f64::INFINITY, -0.1] {
            assert!(matches!(
                network.backpropagation(x.view(), y.view(), learning_rate),
                Err(DnnError::InvalidConfig(_))
            ));
        }
        for (after, before) in network.layers().iter().zip(before.layers()) {
            assert_eq!(after.weights(), before.weights());
            assert_eq!(after.biases(), before.biases());
        }
    }

    #[test]
    fn gradients_match_finite_differences() {
        // Non-sigmoid hidden layers exercise each activation's own derivative.
        for hidden in [Activation::Sigmoid, Activation::Tanh] {
            let network = tiny_network(hidden);
            let (x, y) = batch();
            let gradients = network.gradients(x.view(), y.view()).unwrap();
            let h = 1e-6;

            for l in 0..network.depth() {
                for (i, j) in [(0, 0), (1, 2), (1, 1)] {
                    let mut plus = network.clone();
                    plus.layers_mut()[l].params_mut().0[[i, j]] += h;
                    let mut minus = network.clone();
                    minus.layers_mut()[l].params_mut().0[[i, j]] -= h;
                    let numeric = (categorical_loss(&plus, &x, &y)
                        - categorical_loss(&minus, &x, &y))
                        / (2.0 * h);
                    assert_abs_diff_eq!(gradients.weights()[l][[i, j]], numeric, epsilon = 1e-6);
                }

                let mut plus = network.clone();
                plus.layers_mut()[l].params_mut().1[[0, 1]] += h;
                let mut minus = network.clone();
                minus.layers_mut()[l].params_mut().1[[0, 1]] -= h;
                let numeric = (categorical_loss(&plus, &x, &y)
                    - categorical_loss(&minus, &x, &y))
                    / (2.0 * h);
                assert_abs_diff_eq!(gradients.biases()[l][[0, 1]], numeric, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn backpropagation_reduces_loss_on_the_batch() {
        let mut network = tiny_network(Activation::Sigmoid);
        let (x, y) = batch();
        let before = compute_loss(y.view(), network.forward(x.view()).unwrap().view()).unwrap();
        network.backpropagation(x.view(), y.view(), 0.5).unwrap();
        let after = compute_loss(y.view(), network.forward(x.view()).unwrap().view()).unwrap();
        assert!(after < before, "{after} >= {before}");
    }

    #[test]
    fn empty_batch_is_rejected() {
        let mut network = tiny_network(Activation::Sigmoid);
        let x = Array2::<f64>::zeros((0, 3));
        let y = Array2::<f64>::zeros((0, 2));
        assert!(matches!(
            network.backpropagation(x.view(), y.view(), 0.1),
            Err(DnnError::EmptyBatch { .. })
        ));
    }

    #[test]
    fn mismatched_targets_are_rejected_without_touching_weights() {
        let mut network = tiny_network(Activation::Sigmoid);
        let before = network.layers()[0].weights().clone();
        let (x, _) = batch();
        let y = Array2::<f64>::zeros((2, 2));
        assert!(matches!(
            network.backpropagation(x.view(), y.view(), 0.1),
            Err(DnnError::ShapeMismatch { .. })
        ));
        assert_eq!(network.layers()[0].weights(), &before);
    }

    #[test]
    fn apply_gradients_checks_shapes_first() {
        let mut network = tiny_network(Activation::Sigmoid);
        let before = network.clone();
        let gradients = Gradients {
            weights: vec![Array2::ones((4, 3)), Array2::ones((3, 3))],
            biases: vec![Array2::ones((1, 4)), Array2::ones((1, 2))],
        };
        assert!(network.apply_gradients(&gradients, 1.0).is_err());
        assert_eq!(network.layers()[0].weights(), before.layers()[0].weights());
    }
}
