//! # Train/Test Split
//!
//! Random (seeded) or deterministic-tail partitioning of a windowed dataset.
//! The tail split keeps evaluation data strictly later in time than the
//! training data.

use std::time::{SystemTime, UNIX_EPOCH};

use oorandom::Rand64;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::Dataset;
use crate::error::{Result, StrapdownError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of windows reserved for testing, in `[0, 1]`.
    pub test_fraction: f64,
    /// Draw test windows at random instead of taking the tail.
    pub shuffle: bool,
    /// Seed for the random draw. `None` seeds from the clock.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            shuffle: false,
            seed: None,
        }
    }
}

impl SplitConfig {
    pub fn new(test_fraction: f64) -> Self {
        Self {
            test_fraction,
            ..Self::default()
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction.is_finite() && (0.0..=1.0).contains(&self.test_fraction)) {
            return Err(StrapdownError::config(format!(
                "test fraction {} must lie in [0, 1]",
                self.test_fraction
            )));
        }
        Ok(())
    }

    /// `ceil(total * test_fraction)`.
    pub fn test_len(&self, total: usize) -> usize {
        ((total as f64 * self.test_fraction).ceil() as usize).min(total)
    }
}

/// Disjoint train and test subsets of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train: Dataset,
    pub test: Dataset,
}

/// Partition `dataset` according to `config`.
///
/// Train windows keep their temporal order. Tail splits keep test windows in
/// order as well; shuffled splits keep them in draw order.
pub fn split(dataset: &Dataset, config: &SplitConfig) -> Result<TrainTestSplit> {
    config.validate()?;

    let total = dataset.len();
    let test_len = config.test_len(total);

    if !config.shuffle {
        return Ok(TrainTestSplit {
            train: dataset.take(total - test_len),
            test: dataset.skip(total - test_len),
        });
    }

    let seed = config.seed.unwrap_or_else(|| {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        info!(seed, "no split seed given, drew one from the clock");
        seed
    });

    let test_indices = sample_without_replacement(total, test_len, seed);
    let mut in_test = vec![false; total];
    for &i in &test_indices {
        in_test[i] = true;
    }
    let train_indices: Vec<usize> = (0..total).filter(|&i| !in_test[i]).collect();

    Ok(TrainTestSplit {
        train: dataset.select(&train_indices)?,
        test: dataset.select(&test_indices)?,
    })
}

/// `k` distinct indices from `0..n`, uniformly, via a partial Fisher-Yates.
fn sample_without_replacement(n: usize, k: usize, seed: u64) -> Vec<usize> {
    let mut rng = Rand64::new(u128::from(seed));
    let mut pool: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.rand_range(i as u64..n as u64) as usize;
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(n: usize) -> Dataset {
        let x = (0..n).flat_map(|i| [i as f64, i as f64]).collect();
        let y = (0..n).map(|i| i as f64).collect();
        Dataset::new(x, y, 2, 1, 1).unwrap()
    }

    fn labels(ds: &Dataset) -> Vec<usize> {
        ds.y().iter().map(|&v| v as usize).collect()
    }

    #[test]
    fn test_tail_split() {
        let ds = counting(5);
        let parts = split(&ds, &SplitConfig::new(0.2)).unwrap();
        assert_eq!(labels(&parts.train), vec![0, 1, 2, 3]);
        assert_eq!(labels(&parts.test), vec![4]);
    }

    #[test]
    fn test_test_len_rounds_up() {
        let config = SplitConfig::new(0.25);
        assert_eq!(config.test_len(10), 3);
        assert_eq!(config.test_len(0), 0);
        assert_eq!(SplitConfig::new(1.0).test_len(7), 7);
        assert_eq!(SplitConfig::new(0.0).test_len(7), 0);
    }

    #[test]
    fn test_shuffled_split_is_a_partition() {
        let ds = counting(50);
        let config = SplitConfig::new(0.3).with_shuffle(true).with_seed(7);
        let parts = split(&ds, &config).unwrap();
        assert_eq!(parts.train.len() + parts.test.len(), 50);
        assert_eq!(parts.test.len(), 15);

        let mut all: Vec<usize> = labels(&parts.train);
        all.extend(labels(&parts.test));
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());

        let train = labels(&parts.train);
        assert!(train.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_seed_is_honored() {
        let ds = counting(40);
        let config = SplitConfig::new(0.5).with_shuffle(true).with_seed(42);
        let a = split(&ds, &config).unwrap();
        let b = split(&ds, &config).unwrap();
        assert_eq!(a, b);

        let other = split(&ds, &config.with_seed(43)).unwrap();
        assert_ne!(labels(&a.test), labels(&other.test));
    }

    #[test]
    fn test_invalid_fraction() {
        let ds = counting(3);
        for p in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let err = split(&ds, &SplitConfig::new(p)).unwrap_err();
            assert!(matches!(err, StrapdownError::Configuration(_)));
        }
    }

    #[test]
    fn test_empty_dataset() {
        let ds = Dataset::empty(2, 1, 1).unwrap();
        let parts = split(&ds, &SplitConfig::new(0.5).with_shuffle(true).with_seed(1)).unwrap();
        assert!(parts.train.is_empty());
        assert!(parts.test.is_empty());
    }
}
