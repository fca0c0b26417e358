//! Train the linear baseline on a prepared dataset split.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use strapdown_trainer::{LinearRegressor, TrainConfig, TrainingSession};
use tracing::info;

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train a model on windowed IMU data with resumable checkpoints")]
#[command(version)]
struct Cli {
    /// JSON training config; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model name used for run and checkpoint names
    #[arg(short, long)]
    model_name: Option<String>,

    /// Directory holding the `{model}_{version}` run directories
    #[arg(long)]
    checkpoint_root: Option<PathBuf>,

    /// Directory with the prepared `{stem}_train/_test.safetensors` files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Dataset file stem
    #[arg(short, long)]
    stem: Option<String>,

    /// Epochs to run in this invocation
    #[arg(short, long)]
    epochs: Option<usize>,

    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Write a checkpoint every N epochs
    #[arg(long)]
    save_freq: Option<usize>,

    /// Early-stopping patience in epochs
    #[arg(long)]
    patience: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// Resume this run version instead of starting a new one
    #[arg(short, long)]
    resume: Option<usize>,

    /// Checkpoint position to resume from, in epoch order (default: latest).
    /// An older checkpoint continues in a new run version.
    #[arg(long, requires = "resume")]
    position: Option<usize>,
}

impl Cli {
    fn into_config(self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?,
            None => TrainConfig::default(),
        };

        if let Some(name) = self.model_name {
            config.model_name = name;
        }
        if let Some(root) = self.checkpoint_root {
            config.checkpoint_root = root;
        }
        if let Some(dir) = self.data_dir {
            config.dataset_dir = dir;
        }
        if let Some(stem) = self.stem {
            config.dataset_stem = stem;
        }
        if let Some(epochs) = self.epochs {
            config.max_epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(every) = self.save_freq {
            config.save_freq = every;
        }
        if let Some(patience) = self.patience {
            config.patience = patience;
        }
        if let Some(lr) = self.learning_rate {
            config.learning_rate = lr;
        }
        if let Some(version) = self.resume {
            config = config.with_resume(version, self.position);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Cli::parse().into_config()?;
    config.validate()?;

    let store = config.dataset_store();
    let data = store
        .read()
        .with_context(|| format!("failed to load datasets from {}", config.dataset_dir.display()))?;
    info!(
        train = data.train.len(),
        test = data.test.len(),
        shape = ?data.train.x_shape(),
        "loaded datasets"
    );

    let model = LinearRegressor::for_dataset(&data.train, config.learning_rate)?;
    let mut session = TrainingSession::new(config, model)?;
    let outcome = session.run(&data)?;

    info!(
        version = outcome.version,
        epochs = ?(outcome.start_epoch + 1..=outcome.last_epoch),
        reason = ?outcome.reason,
        "training finished"
    );
    if let Some(report) = outcome.evaluation {
        info!(
            epoch = report.epoch,
            loss = report.loss,
            checkpoint = %report.checkpoint.display(),
            "test loss"
        );
    }
    Ok(())
}
