use clap::Parser;
use dbn_finetune::mnist::{self, MnistData};
use dbn_finetune::{DnnError, HistoryWriter, Network, Silent, TrainingConfig, TrainingObserver};
use log::info;
use ndarray_rand::rand::{SeedableRng, rngs::StdRng};
use std::path::PathBuf;

/// Fine-tunes a feed-forward network on MNIST.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON training configuration.
    #[arg(long)]
    config: PathBuf,

    /// Directory holding the gzipped MNIST IDX files.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Where to write the per-epoch loss history as JSON.
    #[arg(long)]
    history: Option<PathBuf>,

    /// Print one training image before training starts.
    #[arg(long)]
    show: Option<usize>,
}

fn main() -> Result<(), DnnError> {
    env_logger::init();
    let args = Args::parse();

    let config = TrainingConfig::load(&args.config)?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut network = Network::new(
        &config.layer_sizes,
        config.hidden_activation,
        config.init_scale,
        &mut rng,
    )?;

    let mut data = MnistData::load(&args.data_dir)?;
    if let Some(size) = config.validation_size {
        // Fold the standard validation split back in and cut a custom-sized one instead.
        let (training, validation) = data.training.concat(&data.validation)?.split_tail(size)?;
        data.training = training;
        data.validation = validation;
    }
    info!(
        "loaded {} training, {} validation and {} test images",
        data.training.len(),
        data.validation.len(),
        data.test.len()
    );
    if let Some(index) = args.show.filter(|_| !data.training.is_empty()) {
        mnist::visualize(&data.training, index.min(data.training.len().saturating_sub(1)));
    }

    let mut writer = args.history.map(HistoryWriter::new);
    let mut silent = Silent;
    let observer: &mut dyn TrainingObserver = match writer.as_mut() {
        Some(writer) => writer,
        None => &mut silent,
    };
    let validation = (!data.validation.is_empty()).then_some(&data.validation);
    network.train_dataset(&data.training, &config.hyperparameters(), validation, observer)?;

    let (loss, accuracy) = network.evaluate(data.test.inputs(), data.test.labels())?;
    println!("Test set: loss {loss:.3}\tacc {accuracy:.3}");
    Ok(())
}
