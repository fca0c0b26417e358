//! # Windowed Dataset
//!
//! `N` windows of shape `[L, d]` with one label of length `label_dim` each,
//! stored flat and row-major so they can be persisted and handed to a model
//! without reshaping.

use std::ops::Range;

use candle_core::{Device, Tensor};

use crate::error::{Result, StrapdownError};

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    x: Vec<f64>,
    y: Vec<f64>,
    window_len: usize,
    channels: usize,
    label_dim: usize,
}

impl Dataset {
    /// Wrap flat window and label buffers.
    ///
    /// Fails when a dimension is zero or the buffers do not describe the
    /// same number of windows.
    pub fn new(
        x: Vec<f64>,
        y: Vec<f64>,
        window_len: usize,
        channels: usize,
        label_dim: usize,
    ) -> Result<Self> {
        if window_len == 0 || channels == 0 || label_dim == 0 {
            return Err(StrapdownError::config(format!(
                "dataset dimensions must be positive (window_len={window_len}, \
                 channels={channels}, label_dim={label_dim})"
            )));
        }
        let window_size = window_len * channels;
        if x.len() % window_size != 0 || y.len() % label_dim != 0 {
            return Err(StrapdownError::config(
                "window or label buffer is not a whole number of rows",
            ));
        }
        if x.len() / window_size != y.len() / label_dim {
            return Err(StrapdownError::config(format!(
                "{} windows but {} labels",
                x.len() / window_size,
                y.len() / label_dim
            )));
        }

        Ok(Self {
            x,
            y,
            window_len,
            channels,
            label_dim,
        })
    }

    /// A dataset with no windows.
    pub fn empty(window_len: usize, channels: usize, label_dim: usize) -> Result<Self> {
        Self::new(Vec::new(), Vec::new(), window_len, channels, label_dim)
    }

    pub fn len(&self) -> usize {
        self.y.len() / self.label_dim
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn label_dim(&self) -> usize {
        self.label_dim
    }

    /// `[N, L, d]`.
    pub fn x_shape(&self) -> [usize; 3] {
        [self.len(), self.window_len, self.channels]
    }

    /// `[N, label_dim]`.
    pub fn y_shape(&self) -> [usize; 2] {
        [self.len(), self.label_dim]
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    fn window_size(&self) -> usize {
        self.window_len * self.channels
    }

    /// Row-major `[L, d]` values of window `i`.
    pub fn window(&self, i: usize) -> &[f64] {
        let size = self.window_size();
        &self.x[i * size..(i + 1) * size]
    }

    pub fn label(&self, i: usize) -> &[f64] {
        &self.y[i * self.label_dim..(i + 1) * self.label_dim]
    }

    /// `(window, label)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&[f64], &[f64])> {
        self.x
            .chunks_exact(self.window_size())
            .zip(self.y.chunks_exact(self.label_dim))
    }

    /// Windows `range.start..range.end`, clamped to the dataset length.
    pub fn range(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        let size = self.window_size();
        Self {
            x: self.x[start * size..end * size].to_vec(),
            y: self.y[start * self.label_dim..end * self.label_dim].to_vec(),
            ..self.shape_only()
        }
    }

    /// The first `n` windows (all of them if `n >= len`).
    pub fn take(&self, n: usize) -> Self {
        self.range(0..n)
    }

    /// Everything after the first `n` windows.
    pub fn skip(&self, n: usize) -> Self {
        self.range(n..self.len())
    }

    /// Windows at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(StrapdownError::config(format!(
                "window index {bad} out of range for {} windows",
                self.len()
            )));
        }
        let mut out = self.shape_only();
        for &i in indices {
            out.x.extend_from_slice(self.window(i));
            out.y.extend_from_slice(self.label(i));
        }
        Ok(out)
    }

    /// Append `other`, which must have the same window and label shape.
    pub fn concat(&mut self, other: &Dataset) -> Result<()> {
        if (self.window_len, self.channels, self.label_dim)
            != (other.window_len, other.channels, other.label_dim)
        {
            return Err(StrapdownError::config(format!(
                "cannot concatenate datasets of shapes [_, {}, {}]/[_, {}] and [_, {}, {}]/[_, {}]",
                self.window_len,
                self.channels,
                self.label_dim,
                other.window_len,
                other.channels,
                other.label_dim
            )));
        }
        self.x.extend_from_slice(&other.x);
        self.y.extend_from_slice(&other.y);
        Ok(())
    }

    /// Consecutive sub-datasets of at most `batch_size` windows.
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = Dataset> + '_ {
        let batch_size = batch_size.max(1);
        (0..self.len())
            .step_by(batch_size)
            .map(move |start| self.range(start..start + batch_size))
    }

    /// `x` as a `[N, L, d]` and `y` as a `[N, label_dim]` F64 tensor.
    pub fn to_tensors(&self, device: &Device) -> Result<(Tensor, Tensor)> {
        let [n, l, d] = self.x_shape();
        let x = Tensor::from_slice(&self.x, (n, l, d), device)?;
        let y = Tensor::from_slice(&self.y, (n, self.label_dim), device)?;
        Ok((x, y))
    }

    fn shape_only(&self) -> Self {
        Self {
            x: Vec::new(),
            y: Vec::new(),
            window_len: self.window_len,
            channels: self.channels,
            label_dim: self.label_dim,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Window `i` holds the value `i` everywhere; its label is `[i, -i]`.
    fn counting(n: usize) -> Dataset {
        let x = (0..n).flat_map(|i| vec![i as f64; 6]).collect();
        let y = (0..n).flat_map(|i| [i as f64, -(i as f64)]).collect();
        Dataset::new(x, y, 3, 2, 2).unwrap()
    }

    #[test]
    fn test_shapes() {
        let ds = counting(5);
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.x_shape(), [5, 3, 2]);
        assert_eq!(ds.y_shape(), [5, 2]);
        assert_eq!(ds.window(3), &[3.0; 6]);
        assert_eq!(ds.label(4), &[4.0, -4.0]);
    }

    #[test]
    fn test_rejects_mismatched_buffers() {
        assert!(Dataset::new(vec![0.0; 12], vec![0.0; 6], 3, 2, 2).is_err());
        assert!(Dataset::new(vec![0.0; 7], vec![0.0; 2], 3, 2, 2).is_err());
        assert!(Dataset::new(vec![], vec![], 0, 2, 2).is_err());
    }

    #[test]
    fn test_take_skip_partition() {
        let ds = counting(7);
        let head = ds.take(3);
        let tail = ds.skip(3);
        assert_eq!(head.len(), 3);
        assert_eq!(tail.len(), 4);
        assert_eq!(tail.label(0), &[3.0, -3.0]);
        assert_eq!(ds.take(100).len(), 7);
        assert!(ds.skip(100).is_empty());

        let mut joined = head;
        joined.concat(&tail).unwrap();
        assert_eq!(joined, ds);
    }

    #[test]
    fn test_select_and_batches() {
        let ds = counting(5);
        let picked = ds.select(&[4, 0]).unwrap();
        assert_eq!(picked.label(0), &[4.0, -4.0]);
        assert_eq!(picked.label(1), &[0.0, 0.0]);
        assert!(ds.select(&[5]).is_err());

        let sizes: Vec<usize> = ds.batches(2).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_concat_shape_mismatch() {
        let mut ds = counting(2);
        let other = Dataset::new(vec![0.0; 4], vec![0.0; 2], 2, 2, 2).unwrap();
        assert!(ds.concat(&other).is_err());
    }

    #[test]
    fn test_to_tensors() {
        let ds = counting(4);
        let (x, y) = ds.to_tensors(&Device::Cpu).unwrap();
        assert_eq!(x.dims(), &[4, 3, 2]);
        assert_eq!(y.dims(), &[4, 2]);
        let labels: Vec<Vec<f64>> = y.to_vec2().unwrap();
        assert_eq!(labels[2], vec![2.0, -2.0]);
    }
}
