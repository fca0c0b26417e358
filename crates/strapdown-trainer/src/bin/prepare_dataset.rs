//! Build the cached train/test datasets from raw IMU and ground-truth logs.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use strapdown_core::{
    CsvOptions, Dataset, DatasetStore, EndpointDelta, IntegratedDelta, LabelRule, LastSample,
    LinearFilter, NANOSECONDS, Pipeline, PipelineConfig, QuaternionInterpolation, Recording,
    Resampler, SplitConfig, StrapdownError, WindowConfig, read_csv_series,
};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LabelKind {
    /// Trapezoidal integral over the window (velocity → displacement)
    Integrated,
    /// Value at the window's last sample
    Last,
    /// Last minus first sample
    Endpoint,
}

#[derive(Parser)]
#[command(name = "prepare_dataset")]
#[command(about = "Resample, filter and window IMU logs into train/test datasets")]
#[command(version)]
struct Cli {
    /// IMU log (repeat for several recordings)
    #[arg(long, required = true)]
    imu: Vec<PathBuf>,

    /// Ground-truth log, paired with --imu in order
    #[arg(long = "ground-truth", required = true)]
    ground_truth: Vec<PathBuf>,

    /// Multiplier turning raw timestamps into seconds
    #[arg(long, default_value_t = NANOSECONDS)]
    time_scale: f64,

    /// Ground-truth columns to keep, counted after the timestamp
    #[arg(long, value_delimiter = ',', default_values_t = [7usize, 8, 9])]
    gt_columns: Vec<usize>,

    /// First of four kept ground-truth columns holding a (w, x, y, z) quaternion
    #[arg(long)]
    quaternion_start: Option<usize>,

    /// Interpolate the quaternion with SLERP instead of per component
    #[arg(long, requires = "quaternion_start")]
    slerp: bool,

    #[arg(long, value_enum, default_value_t = LabelKind::Integrated)]
    label: LabelKind,

    /// Window length in samples
    #[arg(short, long, default_value_t = 200)]
    window_len: usize,

    /// Window stride in samples (default: window length)
    #[arg(long)]
    stride: Option<usize>,

    /// Butterworth low-pass order applied to the IMU channels
    #[arg(long, requires = "cutoff_hz")]
    filter_order: Option<usize>,

    #[arg(long)]
    cutoff_hz: Option<f64>,

    #[arg(long, default_value_t = 0.2)]
    test_fraction: f64,

    /// Draw test windows at random instead of taking the tail
    #[arg(long)]
    shuffle: bool,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long, default_value = "data")]
    out_dir: PathBuf,

    #[arg(short, long, default_value = "imu")]
    stem: String,

    /// Rebuild even when cached datasets exist
    #[arg(short, long)]
    force: bool,
}

impl Cli {
    fn resampler(&self) -> Resampler {
        match self.quaternion_start {
            Some(start) => {
                let strategy = if self.slerp {
                    QuaternionInterpolation::Slerp
                } else {
                    QuaternionInterpolation::Linear
                };
                Resampler::new().with_quaternion(start).with_strategy(strategy)
            }
            None => Resampler::new(),
        }
    }

    fn label_rule(&self, imu_channels: usize) -> Box<dyn LabelRule> {
        let channels: Vec<usize> = (imu_channels..imu_channels + self.gt_columns.len()).collect();
        match self.label {
            LabelKind::Integrated => Box::new(IntegratedDelta::new(channels)),
            LabelKind::Last => Box::new(LastSample::new(channels)),
            LabelKind::Endpoint => Box::new(EndpointDelta::new(channels)),
        }
    }

    fn split_config(&self) -> SplitConfig {
        let config = SplitConfig::new(self.test_fraction).with_shuffle(self.shuffle);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }

    fn build(&self) -> strapdown_core::Result<Dataset> {
        let imu_options = CsvOptions::new().with_time_scale(self.time_scale);
        let gt_options = imu_options.clone().with_columns(self.gt_columns.clone());

        let recordings = self
            .imu
            .iter()
            .zip(&self.ground_truth)
            .map(|(imu, gt)| -> strapdown_core::Result<Recording> {
                Ok(Recording::new(
                    read_csv_series(imu, &imu_options)?,
                    read_csv_series(gt, &gt_options)?,
                ))
            })
            .collect::<strapdown_core::Result<Vec<_>>>()?;
        let first = recordings
            .first()
            .ok_or_else(|| StrapdownError::config("no recordings given"))?;

        let window = WindowConfig::new(self.window_len).with_stride(self.stride.unwrap_or(self.window_len));
        let mut config = PipelineConfig::new(window).with_resampler(self.resampler());
        if let (Some(order), Some(cutoff)) = (self.filter_order, self.cutoff_hz) {
            let fs = first
                .imu
                .mean_sampling_rate()
                .ok_or_else(|| StrapdownError::config("IMU log too short to estimate its rate"))?;
            info!(order, cutoff_hz = cutoff, sampling_hz = fs, "low-pass filtering IMU channels");
            config = config.with_filter(LinearFilter::butterworth_lowpass(order, cutoff, fs)?);
        }

        let imu_channels = first.imu.channels();
        let pipeline = Pipeline::new(config, imu_channels, self.label_rule(imu_channels));
        pipeline.prepare_all(&recordings)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if cli.imu.len() != cli.ground_truth.len() {
        bail!(
            "{} IMU logs but {} ground-truth logs",
            cli.imu.len(),
            cli.ground_truth.len()
        );
    }

    let store = DatasetStore::new(&cli.out_dir, &cli.stem);
    let parts = store.load_or_build(cli.force, &cli.split_config(), || cli.build())?;

    info!(
        train = parts.train.len(),
        test = parts.test.len(),
        window = ?parts.train.x_shape(),
        labels = parts.train.label_dim(),
        path = %store.train_path.display(),
        "datasets ready"
    );
    Ok(())
}
