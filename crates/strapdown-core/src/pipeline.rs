//! # Preparation Pipeline
//!
//! Raw IMU + ground truth → resampled ground truth on the IMU clock →
//! causal filter on the IMU channels → labelled windows.

use tracing::info;

use crate::dataset::Dataset;
use crate::error::{Result, StrapdownError};
use crate::filter::LinearFilter;
use crate::label::LabelRule;
use crate::resample::Resampler;
use crate::series::TimeSeries;
use crate::window::{WindowAssembler, WindowConfig};

/// How a pair of IMU and ground-truth logs becomes a dataset.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub window: WindowConfig,
    /// Applied to the IMU channels only. `None` skips filtering.
    pub filter: Option<LinearFilter>,
    /// Interpolation of the ground truth onto IMU timestamps.
    pub resampler: Resampler,
}

impl PipelineConfig {
    pub fn new(window: WindowConfig) -> Self {
        Self {
            window,
            filter: None,
            resampler: Resampler::new(),
        }
    }

    pub fn with_filter(mut self, filter: LinearFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_resampler(mut self, resampler: Resampler) -> Self {
        self.resampler = resampler;
        self
    }
}

/// One recording: IMU samples and the reference state they are labelled from.
#[derive(Debug, Clone)]
pub struct Recording {
    pub imu: TimeSeries,
    pub ground_truth: TimeSeries,
}

impl Recording {
    pub fn new(imu: TimeSeries, ground_truth: TimeSeries) -> Self {
        Self { imu, ground_truth }
    }

    /// IMU samples inside the ground-truth time span, with the ground truth
    /// resampled onto them and appended as extra channels.
    ///
    /// Channels `0..imu.channels()` are IMU, the rest are ground truth.
    pub fn align(&self, resampler: &Resampler) -> Result<TimeSeries> {
        let (start, end) = self
            .ground_truth
            .time_range()
            .ok_or_else(|| StrapdownError::config("ground truth is empty"))?;
        let imu = self.imu.clip(start, end);
        if imu.is_empty() {
            return Err(StrapdownError::config(
                "IMU and ground truth do not overlap in time",
            ));
        }
        let truth = resampler.resample(&self.ground_truth, imu.timestamps())?;
        imu.hstack(&truth)
    }
}

/// Turns recordings into a windowed dataset.
///
/// Windows contain the `imu_channels` IMU channels; labels are computed by
/// `label_rule` against the aligned series, so ground-truth channel `g` is
/// addressed as `imu_channels + g`.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    imu_channels: usize,
    assembler: WindowAssembler,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, imu_channels: usize, label_rule: Box<dyn LabelRule>) -> Self {
        let assembler = WindowAssembler::with_rule(config.window, label_rule)
            .with_input_channels((0..imu_channels).collect());
        Self {
            config,
            imu_channels,
            assembler,
        }
    }

    pub fn prepare(&self, recording: &Recording) -> Result<Dataset> {
        if recording.imu.channels() != self.imu_channels {
            return Err(StrapdownError::config(format!(
                "expected {} IMU channels, recording has {}",
                self.imu_channels,
                recording.imu.channels()
            )));
        }

        let aligned = recording.align(&self.config.resampler)?;
        let aligned = match &self.config.filter {
            Some(filter) => {
                let imu: Vec<usize> = (0..self.imu_channels).collect();
                let truth: Vec<usize> = (self.imu_channels..aligned.channels()).collect();
                filter
                    .apply(&aligned.select_channels(&imu)?)?
                    .hstack(&aligned.select_channels(&truth)?)?
            }
            None => aligned,
        };

        let dataset = self.assembler.assemble(&aligned)?;
        info!(
            samples = aligned.len(),
            windows = dataset.len(),
            "prepared recording"
        );
        Ok(dataset)
    }

    /// Prepare several recordings and concatenate them in order.
    pub fn prepare_all(&self, recordings: &[Recording]) -> Result<Dataset> {
        let mut iter = recordings.iter();
        let first = iter
            .next()
            .ok_or_else(|| StrapdownError::config("no recordings to prepare"))?;
        let mut dataset = self.prepare(first)?;
        for recording in iter {
            dataset.concat(&self.prepare(recording)?)?;
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{IntegratedDelta, LastSample};

    /// 1000 IMU samples at 100 Hz with 6 channels, ground truth at 20 Hz
    /// covering the same span with a constant 2 m/s velocity.
    fn recording() -> Recording {
        let imu_ts: Vec<f64> = (0..1000).map(|i| i as f64 / 100.0).collect();
        let imu_rows: Vec<Vec<f64>> = (0..1000)
            .map(|i| (0..6).map(|c| (i * (c + 1)) as f64 * 0.001).collect())
            .collect();
        let gt_ts: Vec<f64> = (0..=200).map(|i| i as f64 / 20.0).collect();
        let gt_rows: Vec<Vec<f64>> = gt_ts.iter().map(|&t| vec![2.0 * t, 2.0]).collect();
        Recording::new(
            TimeSeries::from_rows(imu_ts, &imu_rows).unwrap(),
            TimeSeries::from_rows(gt_ts, &gt_rows).unwrap(),
        )
    }

    #[test]
    fn test_align_appends_ground_truth() {
        let aligned = recording().align(&Resampler::new()).unwrap();
        assert_eq!(aligned.channels(), 8);
        assert_eq!(aligned.len(), 1000);
        let row = aligned.row(150);
        assert!((row[6] - 3.0).abs() < 1e-9);
        assert_eq!(row[7], 2.0);
    }

    #[test]
    fn test_align_clips_imu_to_ground_truth_span() {
        let mut rec = recording();
        rec.ground_truth = rec.ground_truth.clip(1.0, 5.0);
        let aligned = rec.align(&Resampler::new()).unwrap();
        assert_eq!(aligned.timestamps()[0], 1.0);
        assert!(*aligned.timestamps().last().unwrap() <= 5.0);
    }

    #[test]
    fn test_disjoint_recordings_fail() {
        let mut rec = recording();
        let gt_ts = vec![20.0, 21.0];
        rec.ground_truth = TimeSeries::from_rows(gt_ts, &[vec![0.0], vec![1.0]]).unwrap();
        assert!(rec.align(&Resampler::new()).is_err());
    }

    #[test]
    fn test_prepare_windows_imu_and_labels_ground_truth() {
        let config = PipelineConfig::new(WindowConfig::new(200));
        let pipeline = Pipeline::new(config, 6, Box::new(IntegratedDelta::new(vec![7])));
        let ds = pipeline.prepare(&recording()).unwrap();

        assert_eq!(ds.x_shape(), [5, 200, 6]);
        assert_eq!(ds.y_shape(), [5, 1]);
        // 2 m/s over 199 sample intervals of 10 ms.
        assert!((ds.label(0)[0] - 3.98).abs() < 1e-9);
    }

    #[test]
    fn test_prepare_with_filter_keeps_labels() {
        let plain = Pipeline::new(
            PipelineConfig::new(WindowConfig::new(100)),
            6,
            Box::new(LastSample::new(vec![6])),
        );
        let filtered = Pipeline::new(
            PipelineConfig::new(WindowConfig::new(100))
                .with_filter(LinearFilter::moving_average(5).unwrap()),
            6,
            Box::new(LastSample::new(vec![6])),
        );
        let rec = recording();
        let a = plain.prepare(&rec).unwrap();
        let b = filtered.prepare(&rec).unwrap();
        assert_eq!(a.y(), b.y());
        assert_ne!(a.x(), b.x());
    }

    #[test]
    fn test_channel_count_checked() {
        let pipeline = Pipeline::new(
            PipelineConfig::new(WindowConfig::new(10)),
            3,
            Box::new(LastSample::new(vec![0])),
        );
        assert!(pipeline.prepare(&recording()).is_err());
    }
}
