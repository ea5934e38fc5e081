use crate::data::Dataset;
use crate::error::{DnnError, Result};
use crate::metrics::{LOSS_EPSILON, compute_acc, compute_loss_clamped};
use crate::network::Network;
use crate::report::TrainingObserver;
use log::{debug, info, warn};
use ndarray::{ArrayView2, s};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Settings for one supervised fine-tuning run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Hyperparameters {
            epochs: 10,
            batch_size: 32,
            learning_rate: 1e-3,
        }
    }
}

impl Hyperparameters {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DnnError::InvalidConfig("batch_size must be positive".to_string()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(DnnError::InvalidConfig(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Loss and accuracy after one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
}

/// Per-epoch loss values, in order, plus the matching accuracies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub losses: Vec<f64>,
    pub accuracies: Vec<f64>,
}

impl TrainingHistory {
    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    fn push(&mut self, report: &EpochReport) {
        self.losses.push(report.loss);
        self.accuracies.push(report.accuracy);
    }
}

/// Contiguous row ranges of at most `batch_size` rows covering `0..rows`. The last range holds
/// whatever is left over, so every row is visited exactly once per epoch.
pub fn batch_ranges(rows: usize, batch_size: usize) -> Result<Vec<Range<usize>>> {
    if batch_size == 0 {
        return Err(DnnError::InvalidConfig("batch_size must be positive".to_string()));
    }
    Ok((0..rows.div_ceil(batch_size))
        .map(|i| i * batch_size..rows.min((i + 1) * batch_size))
        .collect())
}

impl Network {
    /// Loss and accuracy of the network's predictions for `inputs` against `labels`.
    pub fn evaluate(
        &self,
        inputs: ArrayView2<'_, f64>,
        labels: ArrayView2<'_, f64>,
    ) -> Result<(f64, f64)> {
        let predictions = self.forward(inputs)?;
        let loss = compute_loss_clamped(labels, predictions.view(), LOSS_EPSILON)?;
        let accuracy = compute_acc(labels, predictions.view())?;
        Ok((loss, accuracy))
    }

    /// Supervised fine-tuning with mini-batch gradient descent.
    ///
    /// The rows of `inputs`/`labels` are cut into contiguous batches (see [`batch_ranges`]). Every
    /// epoch runs one backpropagation step per batch, then evaluates on `validation` if given, or
    /// on the whole training set otherwise. Any failing batch aborts the run.
    pub fn train_supervised<'a>(
        &mut self,
        inputs: ArrayView2<'a, f64>,
        labels: ArrayView2<'a, f64>,
        hyperparameters: &Hyperparameters,
        validation: Option<(ArrayView2<'a, f64>, ArrayView2<'a, f64>)>,
        observer: &mut dyn TrainingObserver,
    ) -> Result<TrainingHistory> {
        hyperparameters.validate()?;
        self.check_dataset("training", inputs, labels)?;
        if let Some((validation_inputs, validation_labels)) = validation {
            self.check_dataset("validation", validation_inputs, validation_labels)?;
        }

        let batches = batch_ranges(inputs.nrows(), hyperparameters.batch_size)?;
        let (eval_inputs, eval_labels) = validation.unwrap_or((inputs, labels));
        debug!(
            "training on {} examples in {} batches, evaluating on {}",
            inputs.nrows(),
            batches.len(),
            eval_inputs.nrows()
        );

        let mut history = TrainingHistory::default();
        for epoch in 0..hyperparameters.epochs {
            // Batches are taken in row order; the caller shuffles if it wants to.
            for batch in &batches {
                self.backpropagation(
                    inputs.slice(s![batch.clone(), ..]),
                    labels.slice(s![batch.clone(), ..]),
                    hyperparameters.learning_rate,
                )?;
            }

            let (loss, accuracy) = self.evaluate(eval_inputs, eval_labels)?;
            info!("Epoch {epoch}: loss {loss:.3}\tacc {accuracy:.3}");

            let report = EpochReport {
                epoch,
                loss,
                accuracy,
            };
            observer.on_epoch(&report);
            history.push(&report);
        }

        // The weights are already trained at this point, so a failed plot is only logged.
        if let Err(err) = observer.on_finish(&history) {
            warn!("could not hand the loss history to the observer: {err}");
        }
        Ok(history)
    }

    /// [`Network::train_supervised`] over [`Dataset`]s.
    pub fn train_dataset(
        &mut self,
        training: &Dataset,
        hyperparameters: &Hyperparameters,
        validation: Option<&Dataset>,
        observer: &mut dyn TrainingObserver,
    ) -> Result<TrainingHistory> {
        self.train_supervised(
            training.inputs(),
            training.labels(),
            hyperparameters,
            validation.map(|data| (data.inputs(), data.labels())),
            observer,
        )
    }

    fn check_dataset(
        &self,
        what: &'static str,
        inputs: ArrayView2<'_, f64>,
        labels: ArrayView2<'_, f64>,
    ) -> Result<()> {
        if inputs.nrows() == 0 {
            return Err(DnnError::EmptyBatch { what });
        }
        let expected_inputs = (inputs.nrows(), self.input_dim());
        if inputs.dim() != expected_inputs {
            return Err(DnnError::shape(what, inputs.dim(), expected_inputs));
        }
        let expected_labels = (inputs.nrows(), self.output_dim());
        if labels.dim() != expected_labels {
            return Err(DnnError::shape(what, labels.dim(), expected_labels));
        }
        Ok(())
    }
}
