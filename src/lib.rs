//! A feed-forward classifier built from a pretrained stack of sigmoid layers and fine-tuned with
//! mini-batch backpropagation.
//!
//! Pretraining is left to an external [`Pretrainer`]; this crate owns the supervised part: the
//! cached forward pass, the gradient computation, the training loop and its metrics.

pub mod activation;
pub mod backprop;
pub mod config;
pub mod data;
pub mod error;
pub mod layer;
pub mod metrics;
pub mod mnist;
pub mod network;
pub mod pretrain;
pub mod report;
pub mod train;

pub use activation::Activation;
pub use backprop::Gradients;
pub use config::TrainingConfig;
pub use data::{Dataset, one_hot};
pub use error::{DnnError, Result};
pub use layer::Layer;
pub use metrics::{compute_acc, compute_loss, compute_loss_clamped};
pub use network::{ActivationCache, FineTunePolicy, Network};
pub use pretrain::Pretrainer;
pub use report::{HistoryWriter, ReportCollector, Silent, TrainingObserver};
pub use train::{EpochReport, Hyperparameters, TrainingHistory, batch_ranges};
