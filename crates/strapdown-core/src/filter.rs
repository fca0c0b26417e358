//! # Causal Filtering
//!
//! Linear recursive (IIR/FIR) filtering along the time axis, one channel at a
//! time, starting from a zero state.

use crate::error::{Result, StrapdownError};
use crate::series::TimeSeries;
use crate::stft::{Spectrogram, stft_magnitude};

/// Feedforward `b` / feedback `a` coefficient pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFilter {
    b: Vec<f64>,
    a: Vec<f64>,
}

/// STFT magnitude of channel 0 before and after filtering.
#[derive(Debug, Clone)]
pub struct FilterDiagnostics {
    pub before: Spectrogram,
    pub after: Spectrogram,
}

impl LinearFilter {
    /// Create a filter from its coefficients.
    ///
    /// # Arguments
    /// * `b` - Feedforward coefficients, applied to current and past inputs
    /// * `a` - Feedback coefficients; `a[0]` scales the output and must be non-zero
    pub fn new(b: Vec<f64>, a: Vec<f64>) -> Result<Self> {
        if b.is_empty() || a.is_empty() {
            return Err(StrapdownError::config(
                "filter coefficients `b` and `a` must both be non-empty",
            ));
        }
        if b.iter().chain(&a).any(|c| !c.is_finite()) {
            return Err(StrapdownError::config("filter coefficients must be finite"));
        }
        if a[0] == 0.0 {
            return Err(StrapdownError::config("leading feedback coefficient a[0] is zero"));
        }
        Ok(Self { b, a })
    }

    /// Pass-through filter, `b = [1]`, `a = [1]`.
    pub fn identity() -> Self {
        Self {
            b: vec![1.0],
            a: vec![1.0],
        }
    }

    /// Causal moving average over the last `n` samples.
    pub fn moving_average(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(StrapdownError::config("moving average length must be positive"));
        }
        Self::new(vec![1.0 / n as f64; n], vec![1.0])
    }

    /// Butterworth low-pass designed with the bilinear transform.
    ///
    /// # Arguments
    /// * `order` - 1 or 2
    /// * `cutoff_hz` - Cutoff frequency, strictly between 0 and Nyquist
    /// * `sampling_hz` - Sampling rate of the series to be filtered
    pub fn butterworth_lowpass(order: usize, cutoff_hz: f64, sampling_hz: f64) -> Result<Self> {
        if !(sampling_hz.is_finite() && sampling_hz > 0.0) {
            return Err(StrapdownError::config(format!(
                "invalid sampling frequency {sampling_hz}"
            )));
        }
        if !(cutoff_hz > 0.0 && cutoff_hz < sampling_hz / 2.0) {
            return Err(StrapdownError::config(format!(
                "cutoff {cutoff_hz} Hz must lie in (0, {}) Hz",
                sampling_hz / 2.0
            )));
        }

        // Pre-warped analog cutoff.
        let k = (std::f64::consts::PI * cutoff_hz / sampling_hz).tan();

        match order {
            1 => {
                let norm = 1.0 / (1.0 + k);
                Self::new(vec![k * norm, k * norm], vec![1.0, (k - 1.0) * norm])
            }
            2 => {
                let sqrt2 = std::f64::consts::SQRT_2;
                let k2 = k * k;
                let norm = 1.0 / (1.0 + sqrt2 * k + k2);
                let b0 = k2 * norm;
                Self::new(
                    vec![b0, 2.0 * b0, b0],
                    vec![1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - sqrt2 * k + k2) * norm],
                )
            }
            _ => Err(StrapdownError::config(format!(
                "unsupported Butterworth order {order}, expected 1 or 2"
            ))),
        }
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    pub fn a(&self) -> &[f64] {
        &self.a
    }

    /// Filter one channel.
    pub fn apply_channel(&self, signal: &[f64]) -> Vec<f64> {
        let a0 = self.a[0];
        let mut out = vec![0.0; signal.len()];

        for n in 0..signal.len() {
            let mut acc = 0.0;
            for (k, &bk) in self.b.iter().enumerate().take(n + 1) {
                acc += bk * signal[n - k];
            }
            for (k, &ak) in self.a.iter().enumerate().skip(1).take(n) {
                acc -= ak * out[n - k];
            }
            out[n] = acc / a0;
        }

        out
    }

    /// Filter every channel of `series`; timestamps are kept.
    pub fn apply(&self, series: &TimeSeries) -> Result<TimeSeries> {
        if series.is_empty() {
            return Err(StrapdownError::config("cannot filter an empty series"));
        }

        let d = series.channels();
        let mut values = vec![0.0; series.len() * d];
        for c in 0..d {
            let filtered = self.apply_channel(&series.column(c));
            for (i, v) in filtered.into_iter().enumerate() {
                values[i * d + c] = v;
            }
        }

        TimeSeries::new(series.timestamps().to_vec(), d, values)
    }

    /// Filter `series` and report the STFT magnitude of channel 0 before and
    /// after. The filtered output is identical to [`LinearFilter::apply`].
    pub fn apply_with_diagnostics(
        &self,
        series: &TimeSeries,
        sampling_hz: f64,
        segment_len: usize,
    ) -> Result<(TimeSeries, FilterDiagnostics)> {
        let filtered = self.apply(series)?;
        let before = stft_magnitude(&series.column(0), sampling_hz, segment_len)?;
        let after = stft_magnitude(&filtered.column(0), sampling_hz, segment_len)?;
        Ok((filtered, FilterDiagnostics { before, after }))
    }
}
