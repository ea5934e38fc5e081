//! JSON configuration for a fine-tuning run.
//!
//! ```json
//! {
//!   "layer_sizes": [784, 30, 10],
//!   "hidden_activation": "sigmoid",
//!   "epochs": 30,
//!   "batch_size": 10,
//!   "learning_rate": 0.5,
//!   "seed": 1
//! }
//! ```

use crate::activation::Activation;
use crate::error::{DnnError, Result};
use crate::train::Hyperparameters;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    /// Input size followed by the output size of every layer.
    pub layer_sizes: Vec<usize>,

    #[serde(default = "default_hidden_activation")]
    pub hidden_activation: Activation,

    pub epochs: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Standard deviation of the initial weights.
    #[serde(default = "default_init_scale")]
    pub init_scale: f64,

    /// Seed for weight initialisation. Unseeded runs draw from the OS.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Number of training examples held back for per-epoch evaluation.
    #[serde(default)]
    pub validation_size: Option<usize>,
}

fn default_hidden_activation() -> Activation {
    Activation::Sigmoid
}

fn default_batch_size() -> usize {
    32
}

fn default_learning_rate() -> f64 {
    1e-3
}

fn default_init_scale() -> f64 {
    0.1
}

impl TrainingConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<TrainingConfig> {
        let contents = fs::read_to_string(path)?;
        TrainingConfig::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<TrainingConfig> {
        let config: TrainingConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.layer_sizes.len() < 2 {
            return Err(DnnError::InvalidConfig(
                "layer_sizes needs an input size and at least one layer".to_string(),
            ));
        }
        if self.layer_sizes.contains(&0) {
            return Err(DnnError::InvalidConfig(
                "layer_sizes must all be positive".to_string(),
            ));
        }
        if self.hidden_activation.is_row_wise() {
            return Err(DnnError::InvalidConfig(format!(
                "{:?} cannot be used on hidden layers",
                self.hidden_activation
            )));
        }
        if !(self.init_scale.is_finite() && self.init_scale >= 0.0) {
            return Err(DnnError::InvalidConfig(
                "init_scale must be a non-negative number".to_string(),
            ));
        }
        self.hyperparameters().validate()
    }

    pub fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
        }
    }
}
