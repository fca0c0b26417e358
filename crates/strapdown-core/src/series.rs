//! # Time Series
//!
//! Row-major multi-channel samples with strictly increasing timestamps.

use std::ops::Range;

use crate::error::{Result, StrapdownError};

/// An ordered, timestamped multi-channel signal.
///
/// Sample `i` occupies `values[i * channels..(i + 1) * channels]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<f64>,
    channels: usize,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series from timestamps and row-major values.
    ///
    /// Fails when the channel count is zero, the value count does not match
    /// `timestamps.len() * channels`, or timestamps are not finite and
    /// strictly increasing.
    pub fn new(timestamps: Vec<f64>, channels: usize, values: Vec<f64>) -> Result<Self> {
        if channels == 0 {
            return Err(StrapdownError::config("a time series needs at least one channel"));
        }
        if values.len() != timestamps.len() * channels {
            return Err(StrapdownError::config(format!(
                "expected {} values for {} samples of {} channels, got {}",
                timestamps.len() * channels,
                timestamps.len(),
                channels,
                values.len()
            )));
        }
        if let Some(t) = timestamps.iter().find(|t| !t.is_finite()) {
            return Err(StrapdownError::config(format!("non-finite timestamp {t}")));
        }
        if let Some(pos) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(StrapdownError::config(format!(
                "timestamps must be strictly increasing (index {}: {} then {})",
                pos + 1,
                timestamps[pos],
                timestamps[pos + 1]
            )));
        }

        Ok(Self {
            timestamps,
            channels,
            values,
        })
    }

    /// Build a series from one vector per sample.
    pub fn from_rows(timestamps: Vec<f64>, rows: &[Vec<f64>]) -> Result<Self> {
        let channels = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != channels) {
            return Err(StrapdownError::config(format!(
                "sample {bad} has {} channels, expected {channels}",
                rows[bad].len()
            )));
        }
        if rows.len() != timestamps.len() {
            return Err(StrapdownError::config(format!(
                "{} timestamps for {} samples",
                timestamps.len(),
                rows.len()
            )));
        }
        Self::new(timestamps, channels.max(1), rows.concat())
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Row-major sample values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Values of sample `i`.
    ///
    /// # Panics
    /// If `i >= self.len()`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.channels..(i + 1) * self.channels]
    }

    /// All values of channel `c`, in time order.
    pub fn column(&self, c: usize) -> Vec<f64> {
        self.values
            .iter()
            .skip(c)
            .step_by(self.channels)
            .copied()
            .collect()
    }

    /// First and last timestamp, if any.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((*self.timestamps.first()?, *self.timestamps.last()?))
    }

    /// Average samples per second over the whole series.
    pub fn mean_sampling_rate(&self) -> Option<f64> {
        let (start, end) = self.time_range()?;
        if self.len() < 2 {
            return None;
        }
        Some((self.len() - 1) as f64 / (end - start))
    }

    /// Keep only the listed channels, in the listed order.
    pub fn select_channels(&self, channels: &[usize]) -> Result<Self> {
        check_channels(channels, self.channels)?;
        let values = (0..self.len())
            .flat_map(|i| {
                let row = self.row(i);
                channels.iter().map(move |&c| row[c])
            })
            .collect();
        Self::new(self.timestamps.clone(), channels.len(), values)
    }

    /// Append the channels of `other`, which must share this series' timestamps.
    pub fn hstack(&self, other: &TimeSeries) -> Result<Self> {
        if self.timestamps != other.timestamps {
            return Err(StrapdownError::config(
                "cannot stack series sampled at different timestamps",
            ));
        }
        let channels = self.channels + other.channels;
        let mut values = Vec::with_capacity(self.len() * channels);
        for i in 0..self.len() {
            values.extend_from_slice(self.row(i));
            values.extend_from_slice(other.row(i));
        }
        Self::new(self.timestamps.clone(), channels, values)
    }

    /// Samples whose timestamp lies in `[start, end]`.
    pub fn clip(&self, start: f64, end: f64) -> Self {
        let from = self.timestamps.partition_point(|&t| t < start);
        let to = self.timestamps.partition_point(|&t| t <= end);
        self.slice(from..to.max(from))
    }

    /// Contiguous sub-series by sample index.
    ///
    /// # Panics
    /// If the range is out of bounds.
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            timestamps: self.timestamps[range.clone()].to_vec(),
            channels: self.channels,
            values: self.values[range.start * self.channels..range.end * self.channels].to_vec(),
        }
    }
}

/// Validate that every channel index is below `available`.
pub(crate) fn check_channels(channels: &[usize], available: usize) -> Result<()> {
    if let Some(&c) = channels.iter().find(|&&c| c >= available) {
        return Err(StrapdownError::config(format!(
            "channel {c} out of range for a series with {available} channels"
        )));
    }
    Ok(())
}
