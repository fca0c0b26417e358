//! # Window Assembly
//!
//! Slices a continuous series into fixed-length windows and pairs each with a
//! label. Tails shorter than the window length are dropped, never padded.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{Result, StrapdownError};
use crate::label::{LabelRule, Window};
use crate::series::{TimeSeries, check_channels};

/// Window length and stride, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub window_len: usize,
    pub stride: usize,
}

impl WindowConfig {
    /// Non-overlapping windows of `window_len` samples.
    pub fn new(window_len: usize) -> Self {
        Self {
            window_len,
            stride: window_len,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_len == 0 {
            return Err(StrapdownError::config("window length must be positive"));
        }
        if self.stride == 0 {
            return Err(StrapdownError::config("window stride must be positive"));
        }
        Ok(())
    }

    /// Number of complete windows in a series of `len` samples.
    pub fn window_count(&self, len: usize) -> usize {
        if self.stride == 0 || len < self.window_len {
            return 0;
        }
        (len - self.window_len) / self.stride + 1
    }
}

/// Builds labelled windows from a series.
#[derive(Debug)]
pub struct WindowAssembler {
    config: WindowConfig,
    input_channels: Option<Vec<usize>>,
    label_rule: Box<dyn LabelRule>,
}

impl WindowAssembler {
    pub fn new(config: WindowConfig, label_rule: impl LabelRule + 'static) -> Self {
        Self::with_rule(config, Box::new(label_rule))
    }

    /// Like [`WindowAssembler::new`] for a rule chosen at runtime.
    pub fn with_rule(config: WindowConfig, label_rule: Box<dyn LabelRule>) -> Self {
        Self {
            config,
            input_channels: None,
            label_rule,
        }
    }

    /// Restrict the window tensor to these channels. Labels still read from
    /// the full series.
    pub fn with_input_channels(mut self, channels: Vec<usize>) -> Self {
        self.input_channels = Some(channels);
        self
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    fn input_width(&self, series: &TimeSeries) -> usize {
        self.input_channels
            .as_ref()
            .map_or(series.channels(), Vec::len)
    }

    fn validate(&self, series: &TimeSeries) -> Result<()> {
        self.config.validate()?;
        if let Some(channels) = &self.input_channels {
            if channels.is_empty() {
                return Err(StrapdownError::config("at least one input channel is required"));
            }
            check_channels(channels, series.channels())?;
        }
        if self.label_rule.label_dim() == 0 {
            return Err(StrapdownError::config("label rule produces empty labels"));
        }
        check_channels(self.label_rule.channels(), series.channels())
    }

    /// Window a single series, preserving temporal order.
    pub fn assemble(&self, series: &TimeSeries) -> Result<Dataset> {
        self.validate(series)?;

        let WindowConfig { window_len, stride } = self.config;
        let count = self.config.window_count(series.len());
        let width = self.input_width(series);
        let label_dim = self.label_rule.label_dim();
        let d = series.channels();

        let mut x = Vec::with_capacity(count * window_len * width);
        let mut y = Vec::with_capacity(count * label_dim);

        for w in 0..count {
            let start = w * stride;
            let end = start + window_len;
            let window = Window {
                timestamps: &series.timestamps()[start..end],
                values: &series.values()[start * d..end * d],
                channels: d,
            };

            match &self.input_channels {
                Some(channels) => {
                    for i in 0..window_len {
                        let row = window.row(i);
                        x.extend(channels.iter().map(|&c| row[c]));
                    }
                }
                None => x.extend_from_slice(window.values),
            }

            let label = self.label_rule.label(&window);
            debug_assert_eq!(label.len(), label_dim);
            y.extend(label);
        }

        let covered = match count {
            0 => 0,
            n => (n - 1) * stride + window_len,
        };
        debug!(
            samples = series.len(),
            windows = count,
            dropped = series.len() - covered,
            "assembled windows"
        );

        Dataset::new(x, y, window_len, width, label_dim)
    }

    /// Window several independent series and concatenate the results in
    /// input order.
    pub fn assemble_many(&self, series: &[TimeSeries]) -> Result<Dataset> {
        let first = series
            .first()
            .ok_or_else(|| StrapdownError::config("no series to window"))?;
        let mut dataset = Dataset::empty(
            self.config.window_len.max(1),
            self.input_width(first),
            self.label_rule.label_dim().max(1),
        )?;
        for s in series {
            dataset.concat(&self.assemble(s)?)?;
        }
        Ok(dataset)
    }
}
