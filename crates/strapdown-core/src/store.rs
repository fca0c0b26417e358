//! # Dataset Persistence
//!
//! Datasets are stored as safetensors files holding two `F64` tensors:
//! `x` with shape `[N, L, d]` and `y` with shape `[N, label_dim]`.
//! Loading validates the structure and never repairs a file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use safetensors::tensor::{Dtype, SafeTensors, TensorView};
use tracing::{info, warn};

use crate::dataset::Dataset;
use crate::error::{Result, StrapdownError};
use crate::split::{SplitConfig, TrainTestSplit, split};

/// Metadata value identifying files written by [`save_dataset`].
pub const DATASET_FORMAT: &str = "strapdown-dataset";

const WINDOWS: &str = "x";
const LABELS: &str = "y";

/// Write `dataset` to `path`, replacing any existing file.
///
/// The bytes go to a `.partial` sibling first and are renamed into place, so
/// an interrupted write never leaves a file at `path`.
pub fn save_dataset(path: impl AsRef<Path>, dataset: &Dataset) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let x_bytes = to_le_bytes(dataset.x());
    let y_bytes = to_le_bytes(dataset.y());
    let x = TensorView::new(Dtype::F64, dataset.x_shape().to_vec(), &x_bytes)
        .map_err(|e| StrapdownError::config(format!("window tensor: {e}")))?;
    let y = TensorView::new(Dtype::F64, dataset.y_shape().to_vec(), &y_bytes)
        .map_err(|e| StrapdownError::config(format!("label tensor: {e}")))?;

    let metadata = HashMap::from([("format".to_string(), DATASET_FORMAT.to_string())]);
    let bytes = safetensors::serialize([(WINDOWS, &x), (LABELS, &y)], &Some(metadata))
        .map_err(|e| StrapdownError::config(format!("serializing dataset: {e}")))?;

    let partial = partial_path(path);
    fs::write(&partial, bytes)?;
    fs::rename(&partial, path)?;

    info!(path = %path.display(), windows = dataset.len(), "saved dataset");
    Ok(())
}

/// Read a dataset written by [`save_dataset`].
///
/// Fails with [`StrapdownError::CorruptDataset`] when the file does not parse,
/// lacks `x` or `y`, stores anything but `F64`, has the wrong tensor ranks, or
/// when `x` and `y` disagree on the number of windows.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let buffer = fs::read(path)?;
    let corrupt = |reason: String| StrapdownError::corrupt(path, reason);

    let tensors =
        SafeTensors::deserialize(&buffer).map_err(|e| corrupt(format!("unreadable container: {e}")))?;

    let x = tensors
        .tensor(WINDOWS)
        .map_err(|_| corrupt("missing window tensor `x`".into()))?;
    let y = tensors
        .tensor(LABELS)
        .map_err(|_| corrupt("missing label tensor `y`".into()))?;

    for (name, view) in [(WINDOWS, &x), (LABELS, &y)] {
        if view.dtype() != Dtype::F64 {
            return Err(corrupt(format!("tensor `{name}` has dtype {:?}, expected F64", view.dtype())));
        }
    }

    let &[n, window_len, channels] = x.shape() else {
        return Err(corrupt(format!("window tensor has rank {}, expected 3", x.shape().len())));
    };
    let &[rows, label_dim] = y.shape() else {
        return Err(corrupt(format!("label tensor has rank {}, expected 2", y.shape().len())));
    };
    if rows != n {
        return Err(corrupt(format!("{n} windows but {rows} label rows")));
    }

    Dataset::new(
        from_le_bytes(x.data()),
        from_le_bytes(y.data()),
        window_len,
        channels,
        label_dim,
    )
    .map_err(|e| corrupt(e.to_string()))
}

/// Remove a dataset file if it exists. Returns whether a file was removed.
pub fn invalidate(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    let mut removed = false;
    for candidate in [path.to_path_buf(), partial_path(path)] {
        if candidate.exists() {
            fs::remove_file(&candidate)?;
            removed = true;
        }
    }
    Ok(removed)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn to_le_bytes(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn from_le_bytes(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect()
}

/// A cached train/test pair on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetStore {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
}

impl DatasetStore {
    /// `{dir}/{stem}_train.safetensors` and `{dir}/{stem}_test.safetensors`.
    pub fn new(dir: impl AsRef<Path>, stem: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            train_path: dir.join(format!("{stem}_train.safetensors")),
            test_path: dir.join(format!("{stem}_test.safetensors")),
        }
    }

    /// Both files are present.
    pub fn exists(&self) -> bool {
        self.train_path.exists() && self.test_path.exists()
    }

    /// Delete both files so the next [`DatasetStore::load_or_build`] rebuilds.
    pub fn invalidate(&self) -> Result<()> {
        invalidate(&self.train_path)?;
        invalidate(&self.test_path)?;
        Ok(())
    }

    /// Split `dataset` and persist both halves.
    pub fn write(&self, dataset: &Dataset, config: &SplitConfig) -> Result<TrainTestSplit> {
        let parts = split(dataset, config)?;
        save_dataset(&self.train_path, &parts.train)?;
        save_dataset(&self.test_path, &parts.test)?;
        Ok(parts)
    }

    pub fn read(&self) -> Result<TrainTestSplit> {
        Ok(TrainTestSplit {
            train: load_dataset(&self.train_path)?,
            test: load_dataset(&self.test_path)?,
        })
    }

    /// Read the cached split, or build, split and persist a new one when the
    /// cache is missing or `force` is set.
    pub fn load_or_build<F>(&self, force: bool, config: &SplitConfig, build: F) -> Result<TrainTestSplit>
    where
        F: FnOnce() -> Result<Dataset>,
    {
        config.validate()?;
        if !force && self.exists() {
            info!(train = %self.train_path.display(), "using cached datasets");
            return self.read();
        }
        if force && self.exists() {
            warn!(train = %self.train_path.display(), "rebuilding cached datasets");
        }
        self.invalidate()?;
        let dataset = build()?;
        self.write(&dataset, config)
    }
}
