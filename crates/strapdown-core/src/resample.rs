//! # Resampling
//!
//! Maps a time series onto a new timestamp grid by per-channel linear
//! interpolation. Targets outside the reference timestamps are rejected,
//! never extrapolated.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, StrapdownError};
use crate::series::TimeSeries;

/// How quaternion channel groups are interpolated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuaternionInterpolation {
    /// Component-wise linear blend. Inaccurate for large rotations, so every
    /// call that uses it logs a warning.
    #[default]
    Linear,
    /// Spherical linear interpolation along the shortest arc.
    Slerp,
}

/// Resampler configuration.
#[derive(Debug, Clone, Default)]
pub struct Resampler {
    /// Start channels of `(w, x, y, z)` quaternion groups.
    quaternions: Vec<usize>,
    strategy: QuaternionInterpolation,
}

impl Resampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare channels `start..start + 4` as a unit quaternion.
    pub fn with_quaternion(mut self, start: usize) -> Self {
        self.quaternions.push(start);
        self
    }

    /// Choose how declared quaternion groups are interpolated.
    pub fn with_strategy(mut self, strategy: QuaternionInterpolation) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> QuaternionInterpolation {
        self.strategy
    }

    /// Whether [`Resampler::resample`] blends quaternion groups component-wise
    /// and therefore logs the accuracy warning.
    pub fn discloses_linear_quaternion(&self) -> bool {
        !self.quaternions.is_empty() && self.strategy == QuaternionInterpolation::Linear
    }

    /// Sample `series` at `target_ts`.
    ///
    /// Every target must lie within the series' first and last timestamp and
    /// the targets must be strictly increasing.
    pub fn resample(&self, series: &TimeSeries, target_ts: &[f64]) -> Result<TimeSeries> {
        let d = series.channels();
        for &start in &self.quaternions {
            if start + 4 > d {
                return Err(StrapdownError::config(format!(
                    "quaternion group at channel {start} exceeds {d} channels"
                )));
            }
        }
        let mut groups = self.quaternions.clone();
        groups.sort_unstable();
        if groups.windows(2).any(|w| w[1] - w[0] < 4) {
            return Err(StrapdownError::config("quaternion groups overlap"));
        }

        let (min, max) = series
            .time_range()
            .ok_or_else(|| StrapdownError::config("cannot resample an empty series"))?;
        if let Some(&value) = target_ts.iter().find(|&&t| !(min..=max).contains(&t)) {
            return Err(StrapdownError::OutOfRange { value, min, max });
        }

        if self.discloses_linear_quaternion() {
            warn!(
                groups = self.quaternions.len(),
                "quaternion channels interpolated component-wise; \
                 the result may be inaccurate for large rotational deltas"
            );
        }

        let ref_ts = series.timestamps();
        let mut values = Vec::with_capacity(target_ts.len() * d);
        let mut row = vec![0.0; d];

        for &t in target_ts {
            let k = ref_ts.partition_point(|&r| r < t);
            if ref_ts[k] == t {
                values.extend_from_slice(series.row(k));
                continue;
            }

            let (t0, t1) = (ref_ts[k - 1], ref_ts[k]);
            let w = (t - t0) / (t1 - t0);
            let (a, b) = (series.row(k - 1), series.row(k));
            for (c, out) in row.iter_mut().enumerate() {
                *out = lerp(a[c], b[c], w);
            }
            if self.strategy == QuaternionInterpolation::Slerp {
                for &s in &self.quaternions {
                    let q = slerp(quat(&a[s..s + 4]), quat(&b[s..s + 4]), w);
                    row[s..s + 4].copy_from_slice(&q);
                }
            }
            values.extend_from_slice(&row);
        }

        TimeSeries::new(target_ts.to_vec(), d, values)
    }
}

/// Linear resampling without quaternion handling.
pub fn resample_linear(series: &TimeSeries, target_ts: &[f64]) -> Result<TimeSeries> {
    Resampler::new().resample(series, target_ts)
}

fn lerp(a: f64, b: f64, w: f64) -> f64 {
    a * (1.0 - w) + b * w
}

fn quat(v: &[f64]) -> [f64; 4] {
    [v[0], v[1], v[2], v[3]]
}

fn normalize(q: [f64; 4]) -> [f64; 4] {
    let norm = q.iter().map(|c| c * c).sum::<f64>().sqrt();
    if norm == 0.0 {
        return q;
    }
    q.map(|c| c / norm)
}

/// Spherical interpolation between two quaternions, shortest arc.
pub fn slerp(q0: [f64; 4], q1: [f64; 4], w: f64) -> [f64; 4] {
    let q0 = normalize(q0);
    let mut q1 = normalize(q1);

    let mut dot: f64 = q0.iter().zip(&q1).map(|(a, b)| a * b).sum();
    if dot < 0.0 {
        q1 = q1.map(|c| -c);
        dot = -dot;
    }

    // Nearly parallel: sin(theta) vanishes, normalized lerp is exact enough.
    if dot > 0.9995 {
        let mut out = [0.0; 4];
        for i in 0..4 {
            out[i] = lerp(q0[i], q1[i], w);
        }
        return normalize(out);
    }

    let theta = dot.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let s0 = ((1.0 - w) * theta).sin() / sin_theta;
    let s1 = (w * theta).sin() / sin_theta;

    let mut out = [0.0; 4];
    for i in 0..4 {
        out[i] = s0 * q0[i] + s1 * q1[i];
    }
    out
}
