//! Short-time Fourier transform magnitude, used only for filter diagnostics.

use std::f64::consts::PI;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{Result, StrapdownError};

/// One-sided STFT magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    /// Bin frequencies in Hz, `segment_len / 2 + 1` entries.
    pub frequencies: Vec<f64>,
    /// Segment centre times in seconds.
    pub times: Vec<f64>,
    /// `magnitude[segment][bin]`.
    pub magnitude: Vec<Vec<f64>>,
}

/// Hann-windowed STFT with 50% overlap and zero-padded boundaries.
///
/// Magnitudes are scaled by the window sum, so a full-scale sinusoid that
/// falls on a bin reads roughly half its amplitude.
pub fn stft_magnitude(signal: &[f64], sampling_hz: f64, segment_len: usize) -> Result<Spectrogram> {
    if !(sampling_hz.is_finite() && sampling_hz > 0.0) {
        return Err(StrapdownError::config(format!(
            "a positive sampling frequency is required for the STFT, got {sampling_hz}"
        )));
    }
    if segment_len < 2 {
        return Err(StrapdownError::config("STFT segment length must be at least 2"));
    }
    if signal.is_empty() {
        return Err(StrapdownError::config("cannot compute the STFT of an empty signal"));
    }

    let hop = segment_len / 2;
    let window: Vec<f64> = (0..segment_len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / segment_len as f64).cos())
        .collect();
    let scale: f64 = window.iter().sum();

    // Pad half a segment on both sides, then up to a whole number of hops.
    let mut padded = vec![0.0; hop];
    padded.extend_from_slice(signal);
    padded.extend(std::iter::repeat_n(0.0, hop));
    let excess = (padded.len().saturating_sub(segment_len)) % hop;
    if excess != 0 {
        padded.extend(std::iter::repeat_n(0.0, hop - excess));
    }
    if padded.len() < segment_len {
        padded.resize(segment_len, 0.0);
    }

    let bins = segment_len / 2 + 1;
    let frequencies = (0..bins)
        .map(|k| k as f64 * sampling_hz / segment_len as f64)
        .collect();

    let fft = FftPlanner::<f64>::new().plan_fft_forward(segment_len);
    let mut buffer = vec![Complex::new(0.0, 0.0); segment_len];

    let mut times = Vec::new();
    let mut magnitude: Vec<Vec<f64>> = Vec::new();
    let mut start = 0;
    while start + segment_len <= padded.len() {
        let segment = &padded[start..start + segment_len];
        for ((slot, &x), &w) in buffer.iter_mut().zip(segment).zip(&window) {
            *slot = Complex::new(x * w, 0.0);
        }
        fft.process(&mut buffer);
        magnitude.push(buffer[..bins].iter().map(|c| c.norm() / scale).collect());
        times.push(start as f64 / sampling_hz);
        start += hop;
    }

    Ok(Spectrogram {
        frequencies,
        times,
        magnitude,
    })
}
