use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A layer nonlinearity, carrying both its forward transform and the derivative of that transform
/// expressed in terms of its own output. Backpropagation only ever sees a layer's cached output,
/// so every variant has to be able to recover its local derivative from `a = f(z)` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// σ(z) = 1 / (1 + e^-z), the activation used by the pretrained stack.
    Sigmoid,
    Tanh,
    Relu,
    Identity,
    /// Row-wise normalised exponential. Only valid on the output layer.
    Softmax,
}

impl Activation {
    /// Applies the activation to a batch of pre-activations (rows = examples).
    pub fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Sigmoid => z.mapv(sigmoid),
            Activation::Tanh => z.mapv(f64::tanh),
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Identity => z.clone(),
            Activation::Softmax => softmax(z),
        }
    }

    /// Local derivative df/dz evaluated from the activation's output `a`.
    ///
    /// For softmax this is only the diagonal of the Jacobian. The backpropagation engine never asks
    /// for it, since the output layer's error signal is taken in closed form against cross-entropy.
    pub fn derivative_from_output(self, a: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Sigmoid | Activation::Softmax => a.mapv(|v| v * (1.0 - v)),
            Activation::Tanh => a.mapv(|v| 1.0 - v * v),
            Activation::Relu => a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Identity => Array2::ones(a.raw_dim()),
        }
    }

    /// Whether the activation mixes values across a row. Such activations cannot sit on a hidden
    /// layer because their elementwise derivative would be wrong.
    pub fn is_row_wise(self) -> bool {
        matches!(self, Activation::Softmax)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + f64::exp(-z))
}

// Subtracting the row maximum keeps exp() from overflowing without changing the result.
fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let mut out = z.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}
