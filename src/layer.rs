use crate::activation::Activation;
use crate::error::{DnnError, Result};
use ndarray::{Array, Array2, ArrayView2};
use ndarray_rand::{RandomExt, rand::Rng, rand_distr::StandardNormal};

/// An affine transform followed by a nonlinearity: `a = f(x · Wᵀ + b)`.
///
/// `weights` is `[output_dim x input_dim]` and `biases` is `[1 x output_dim]`, so a batch with one
/// example per row maps to a batch with one output per row.
#[derive(Debug, Clone)]
pub struct Layer {
    weights: Array2<f64>,
    biases: Array2<f64>,
    activation: Activation,
}

impl Layer {
    /// Builds a layer with weights drawn from a standard normal distribution scaled by `scale`, and
    /// zero biases.
    pub fn random<R: Rng + ?Sized>(
        input_dim: usize,
        output_dim: usize,
        activation: Activation,
        scale: f64,
        rng: &mut R,
    ) -> Layer {
        let weights: Array2<f64> =
            Array::random_using((output_dim, input_dim), StandardNormal, rng) * scale;
        Layer {
            weights,
            biases: Array2::zeros((1, output_dim)),
            activation,
        }
    }

    /// Wraps existing parameters, e.g. the output of a pretraining run.
    pub fn from_parts(
        weights: Array2<f64>,
        biases: Array2<f64>,
        activation: Activation,
    ) -> Result<Layer> {
        let expected = (1, weights.nrows());
        if biases.dim() != expected {
            return Err(DnnError::shape("layer biases", biases.dim(), expected));
        }
        Ok(Layer {
            weights,
            biases,
            activation,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn biases(&self) -> &Array2<f64> {
        &self.biases
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn set_activation(&mut self, activation: Activation) {
        self.activation = activation;
    }

    /// Mutable access to `(weights, biases)` for collaborators that fit the parameters themselves.
    pub fn params_mut(&mut self) -> (&mut Array2<f64>, &mut Array2<f64>) {
        (&mut self.weights, &mut self.biases)
    }

    /// Computes this layer's activations for a batch. The batch must have one column per input.
    pub fn forward(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if input.ncols() != self.input_dim() {
            return Err(DnnError::shape(
                "layer input",
                input.dim(),
                (input.nrows(), self.input_dim()),
            ));
        }
        let z = input.dot(&self.weights.t()) + &self.biases;
        Ok(self.activation.apply(&z))
    }
}
