//! # Label Rules
//!
//! A label rule summarizes one window into a fixed-size target vector.
//! Rules must be deterministic and depend only on the window they are given.

use std::fmt::Debug;

/// A borrowed window of consecutive samples.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    /// Timestamps of the window's samples.
    pub timestamps: &'a [f64],
    /// Row-major values, `timestamps.len() * channels` entries.
    pub values: &'a [f64],
    pub channels: usize,
}

impl<'a> Window<'a> {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn row(&self, i: usize) -> &'a [f64] {
        &self.values[i * self.channels..(i + 1) * self.channels]
    }
}

/// Derives the label of a window.
pub trait LabelRule: Debug + Send + Sync {
    /// Source channels the rule reads.
    fn channels(&self) -> &[usize];

    /// Length of the produced label vector.
    fn label_dim(&self) -> usize {
        self.channels().len()
    }

    /// Compute the label. `window` is never empty.
    fn label(&self, window: &Window<'_>) -> Vec<f64>;
}

/// Trapezoidal integral of the selected channels over the window's time span.
///
/// With velocity-like state-delta channels this yields the displacement
/// accumulated across the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegratedDelta {
    pub channels: Vec<usize>,
}

impl IntegratedDelta {
    pub fn new(channels: Vec<usize>) -> Self {
        Self { channels }
    }
}

impl LabelRule for IntegratedDelta {
    fn channels(&self) -> &[usize] {
        &self.channels
    }

    fn label(&self, window: &Window<'_>) -> Vec<f64> {
        let mut acc = vec![0.0; self.channels.len()];
        for i in 1..window.len() {
            let dt = window.timestamps[i] - window.timestamps[i - 1];
            let (prev, curr) = (window.row(i - 1), window.row(i));
            for (out, &c) in acc.iter_mut().zip(&self.channels) {
                *out += 0.5 * (prev[c] + curr[c]) * dt;
            }
        }
        acc
    }
}

/// The selected channels of the window's last sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastSample {
    pub channels: Vec<usize>,
}

impl LastSample {
    pub fn new(channels: Vec<usize>) -> Self {
        Self { channels }
    }
}

impl LabelRule for LastSample {
    fn channels(&self) -> &[usize] {
        &self.channels
    }

    fn label(&self, window: &Window<'_>) -> Vec<f64> {
        let last = window.row(window.len() - 1);
        self.channels.iter().map(|&c| last[c]).collect()
    }
}

/// Last minus first sample of the selected channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDelta {
    pub channels: Vec<usize>,
}

impl EndpointDelta {
    pub fn new(channels: Vec<usize>) -> Self {
        Self { channels }
    }
}

impl LabelRule for EndpointDelta {
    fn channels(&self) -> &[usize] {
        &self.channels
    }

    fn label(&self, window: &Window<'_>) -> Vec<f64> {
        let (first, last) = (window.row(0), window.row(window.len() - 1));
        self.channels.iter().map(|&c| last[c] - first[c]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window<'a>(ts: &'a [f64], values: &'a [f64]) -> Window<'a> {
        Window {
            timestamps: ts,
            values,
            channels: 2,
        }
    }

    #[test]
    fn test_integrated_constant() {
        let ts = [0.0, 0.01, 0.02, 0.03, 0.04];
        let values = [2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0];
        let label = IntegratedDelta::new(vec![0]).label(&window(&ts, &values));
        assert!((label[0] - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_integrated_ramp_is_trapezoidal() {
        let ts = [0.0, 1.0, 3.0];
        let values = [0.0, 0.0, 2.0, 0.0, 6.0, 0.0];
        let label = IntegratedDelta::new(vec![0, 1]).label(&window(&ts, &values));
        // 0.5 * (0 + 2) * 1 + 0.5 * (2 + 6) * 2
        assert_eq!(label, vec![9.0, 0.0]);
    }

    #[test]
    fn test_last_sample_and_endpoint_delta() {
        let ts = [0.0, 1.0, 2.0];
        let values = [1.0, 10.0, 4.0, 20.0, 7.0, 35.0];
        let w = window(&ts, &values);

        assert_eq!(LastSample::new(vec![1, 0]).label(&w), vec![35.0, 7.0]);
        assert_eq!(EndpointDelta::new(vec![0, 1]).label(&w), vec![6.0, 25.0]);
        assert_eq!(EndpointDelta::new(vec![0]).label_dim(), 1);
    }

    #[test]
    fn test_rules_are_deterministic() {
        let ts = [0.0, 0.5, 1.25];
        let values = [0.3, -1.0, 0.9, 2.0, -0.4, 0.1];
        let w = window(&ts, &values);
        let rule = IntegratedDelta::new(vec![0, 1]);
        assert_eq!(rule.label(&w), rule.label(&w));
    }
}
