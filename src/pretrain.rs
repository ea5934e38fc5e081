//! Seam for unsupervised layer-wise pretraining.
//!
//! The pretraining algorithm itself (a stack of restricted Boltzmann machines, for instance) lives
//! outside this crate. A [`Pretrainer`] is handed one layer at a time together with the data that
//! layer sees, and may rewrite its weights and biases in place.

use crate::error::{DnnError, Result};
use crate::layer::Layer;
use crate::network::Network;
use log::info;
use ndarray::ArrayView2;

pub trait Pretrainer {
    /// Fits `layer` to `input`, whose rows are the examples and whose columns match the layer's
    /// input dimension.
    fn pretrain_layer(
        &mut self,
        index: usize,
        layer: &mut Layer,
        input: ArrayView2<'_, f64>,
    ) -> Result<()>;
}

impl Network {
    /// Greedy layer-wise pretraining. Each layer is fitted to the output of the already-pretrained
    /// layers below it. The output layer is skipped when the fine-tune policy excludes it.
    ///
    /// Returns the number of layers that were handed to the pretrainer.
    pub fn pretrain<P: Pretrainer + ?Sized>(
        &mut self,
        pretrainer: &mut P,
        inputs: ArrayView2<'_, f64>,
    ) -> Result<usize> {
        if inputs.ncols() != self.input_dim() {
            return Err(DnnError::shape(
                "pretraining inputs",
                inputs.dim(),
                (inputs.nrows(), self.input_dim()),
            ));
        }
        let count = if self.policy().exclude_last_from_pretraining {
            self.depth() - 1
        } else {
            self.depth()
        };

        let mut data = inputs.to_owned();
        for (index, layer) in self.layers_mut().iter_mut().take(count).enumerate() {
            info!("pretraining layer {index} on {} examples", data.nrows());
            pretrainer.pretrain_layer(index, layer, data.view())?;
            if index + 1 < count {
                data = layer.forward(data.view())?;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::network::FineTunePolicy;
    use ndarray::Array2;

    /// Records what it was given and nudges every bias so the update is observable.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<(usize, (usize, usize))>,
    }

    impl Pretrainer for Recorder {
        fn pretrain_layer(
            &mut self,
            index: usize,
            layer: &mut Layer,
            input: ArrayView2<'_, f64>,
        ) -> Result<()> {
            self.seen.push((index, input.dim()));
            layer.params_mut().1.fill(1.0);
            Ok(())
        }
    }

    struct Failing;

    impl Pretrainer for Failing {
        fn pretrain_layer(
            &mut self,
            _: usize,
            _: &mut Layer,
            _: ArrayView2<'_, f64>,
        ) -> Result<()> {
            Err(DnnError::InvalidData("no convergence".to_string()))
        }
    }

    fn stack(policy: FineTunePolicy) -> Network {
        let layers = [(6, 4), (4, 3), (3, 2)]
            .into_iter()
            .map(|(input_dim, output_dim)| {
                Layer::from_parts(
                    Array2::zeros((output_dim, input_dim)),
                    Array2::zeros((1, output_dim)),
                    Activation::Sigmoid,
                )
                .unwrap()
            })
            .collect();
        Network::from_layers(layers, policy).unwrap()
    }

    #[test]
    fn skips_the_output_layer_by_default() {
        let mut network = stack(FineTunePolicy::default());
        let mut recorder = Recorder::default();
        let count = network
            .pretrain(&mut recorder, Array2::<f64>::zeros((10, 6)).view())
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(recorder.seen, vec![(0, (10, 6)), (1, (10, 4))]);
        assert!(network.layers()[2].biases().iter().all(|&b| b == 0.0));
        assert!(network.layers()[1].biases().iter().all(|&b| b == 1.0));
        assert_eq!(network.layers()[2].activation(), Activation::Softmax);
    }

    #[test]
    fn can_include_the_output_layer() {
        let mut network = stack(FineTunePolicy {
            exclude_last_from_pretraining: false,
            softmax_output: true,
        });
        let mut recorder = Recorder::default();
        network
            .pretrain(&mut recorder, Array2::<f64>::zeros((3, 6)).view())
            .unwrap();
        assert_eq!(recorder.seen.last(), Some(&(2, (3, 3))));
    }

    #[test]
    fn pretrainer_errors_propagate() {
        let mut network = stack(FineTunePolicy::default());
        assert!(network.pretrain(&mut Failing, Array2::<f64>::zeros((1, 6)).view()).is_err());
    }
}
