//! Score the checkpoints of a training run on the test split.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use strapdown_core::DatasetStore;
use strapdown_trainer::baseline::DEFAULT_LEARNING_RATE;
use strapdown_trainer::{
    CheckpointNaming, LinearRegressor, RunManager, TrainingProgression, evaluate_checkpoint,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "evaluate")]
#[command(about = "Evaluate saved checkpoints on the held-out dataset")]
#[command(version)]
struct Cli {
    /// Run version to evaluate
    version: usize,

    #[arg(short, long, default_value = "strapdown")]
    model_name: String,

    #[arg(long, default_value = "checkpoints")]
    checkpoint_root: PathBuf,

    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(short, long, default_value = "imu")]
    stem: String,

    /// Evaluate every checkpoint instead of only the best one
    #[arg(short, long)]
    all: bool,

    /// Zero-padding width of checkpoint epoch numbers
    #[arg(long, default_value_t = 2)]
    width: usize,

    #[arg(long, default_value = "safetensors")]
    extension: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let test = DatasetStore::new(&cli.data_dir, &cli.stem)
        .read()
        .with_context(|| format!("failed to load datasets from {}", cli.data_dir.display()))?
        .test;
    if test.is_empty() {
        bail!("test split in {} is empty", cli.data_dir.display());
    }

    let mut manager = RunManager::new(
        &cli.checkpoint_root,
        &cli.model_name,
        CheckpointNaming::new(cli.width, &cli.extension),
    );
    manager.open(cli.version)?;
    let Some(dir) = manager.version_dir() else {
        bail!("run version {} is not bound", cli.version);
    };

    let mut model = LinearRegressor::for_dataset(&test, DEFAULT_LEARNING_RATE)?;
    let progression = if cli.all {
        TrainingProgression::evaluate(&mut model, &manager.checkpoints()?, &test)?
    } else {
        let Some((epoch, checkpoint)) = manager.best_checkpoint()? else {
            bail!("no checkpoints in {}", dir.display());
        };
        TrainingProgression::from(vec![evaluate_checkpoint(&mut model, &checkpoint, epoch, &test)?])
    };

    for (epoch, loss) in progression.curve() {
        println!("epoch {epoch:>4}  loss {loss:.6}");
    }
    if let Some(best) = progression.best() {
        info!(epoch = best.epoch, loss = best.loss, "best checkpoint");
    }
    let path = progression.save(&dir)?;
    info!(path = %path.display(), "wrote evaluation report");
    Ok(())
}
