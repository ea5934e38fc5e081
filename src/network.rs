use crate::activation::Activation;
use crate::error::{DnnError, Result};
use crate::layer::Layer;
use crate::metrics::argmax_rows;
use log::debug;
use ndarray::{Array2, ArrayView2};
use ndarray_rand::rand::Rng;

/// How a stack of pretrained layers is turned into a supervised classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FineTunePolicy {
    /// Leave the output layer out of unsupervised pretraining. Its weights only get meaning once
    /// labels are involved.
    pub exclude_last_from_pretraining: bool,
    /// Replace the output layer's activation with softmax at construction time.
    pub softmax_output: bool,
}

impl Default for FineTunePolicy {
    fn default() -> Self {
        FineTunePolicy {
            exclude_last_from_pretraining: true,
            softmax_output: true,
        }
    }
}

/// Every intermediate output of one forward pass: the raw input at index 0, then one entry per
/// layer. The last entry is the network's output.
#[derive(Debug, Clone)]
pub struct ActivationCache {
    activations: Vec<Array2<f64>>,
}

impl ActivationCache {
    pub fn len(&self) -> usize {
        self.activations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Array2<f64>> {
        self.activations.get(index)
    }

    pub fn input(&self) -> &Array2<f64> {
        &self.activations[0]
    }

    pub fn output(&self) -> &Array2<f64> {
        &self.activations[self.activations.len() - 1]
    }

    pub fn as_slice(&self) -> &[Array2<f64>] {
        &self.activations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Array2<f64>> {
        self.activations.iter()
    }

    pub fn into_output(mut self) -> Array2<f64> {
        // Never empty: construction always pushes the input.
        self.activations.pop().unwrap_or_default()
    }
}

/// A feed-forward stack of layers fine-tuned as a multi-class classifier.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    policy: FineTunePolicy,
}

impl Network {
    /// Builds a fresh network from layer sizes, e.g. `[784, 30, 10]`. Hidden layers use
    /// `hidden_activation`, weights are standard normal samples scaled by `init_scale`.
    pub fn new<R: Rng + ?Sized>(
        sizes: &[usize],
        hidden_activation: Activation,
        init_scale: f64,
        rng: &mut R,
    ) -> Result<Network> {
        if sizes.len() < 2 {
            return Err(DnnError::InvalidConfig(format!(
                "a network needs an input size and at least one layer size, got {sizes:?}"
            )));
        }
        if let Some(position) = sizes.iter().position(|&size| size == 0) {
            return Err(DnnError::InvalidConfig(format!(
                "layer size at position {position} is zero"
            )));
        }

        let layers = sizes
            .iter()
            .zip(sizes.iter().skip(1))
            .map(|(&input_dim, &output_dim)| {
                Layer::random(input_dim, output_dim, hidden_activation, init_scale, &mut *rng)
            })
            .collect();

        Network::from_layers(layers, FineTunePolicy::default())
    }

    /// Assembles a network from an existing layer stack. Adjacent layers must agree on their
    /// dimensions, and when the policy asks for it the last layer's activation is overwritten with
    /// softmax.
    pub fn from_layers(mut layers: Vec<Layer>, policy: FineTunePolicy) -> Result<Network> {
        let depth = layers.len();
        if depth == 0 {
            return Err(DnnError::InvalidConfig(
                "a network needs at least one layer".to_string(),
            ));
        }

        for pair in layers.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            if current.output_dim() != next.input_dim() {
                return Err(DnnError::shape(
                    "weights of the following layer",
                    next.weights().dim(),
                    (next.output_dim(), current.output_dim()),
                ));
            }
        }

        if let Some(index) = layers[..depth - 1]
            .iter()
            .position(|layer| layer.activation().is_row_wise())
        {
            return Err(DnnError::InvalidConfig(format!(
                "hidden layer {index} uses a row-wise activation without an elementwise derivative"
            )));
        }

        if policy.softmax_output {
            layers[depth - 1].set_activation(Activation::Softmax);
        }

        debug!(
            "built network: {} -> {}",
            layers[0].input_dim(),
            layers
                .iter()
                .map(|layer| layer.output_dim().to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(Network { layers, policy })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    // Kept crate-private so nothing outside can break the adjacency invariant.
    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn policy(&self) -> FineTunePolicy {
        self.policy
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].input_dim()
    }

    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].output_dim()
    }

    /// Computes the network's output without keeping the intermediate activations.
    pub fn forward(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let mut activation = self.layers[0].forward(input)?;
        for layer in &self.layers[1..] {
            activation = layer.forward(activation.view())?;
        }
        Ok(activation)
    }

    /// Runs a forward pass and returns every intermediate output. The cache belongs to the caller;
    /// nothing is retained on the network between passes.
    pub fn forward_full(&self, input: ArrayView2<'_, f64>) -> Result<ActivationCache> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_owned());
        for layer in &self.layers {
            let next = layer.forward(activations[activations.len() - 1].view())?;
            activations.push(next);
        }
        Ok(ActivationCache { activations })
    }

    /// The index of the most probable class for every row of `input`.
    pub fn predict_classes(&self, input: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        Ok(argmax_rows(self.forward(input)?.view()))
    }
}
