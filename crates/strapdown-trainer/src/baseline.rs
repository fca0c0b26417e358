//! Linear baseline: flattened window → label, trained with AdamW on MSE.

use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{AdamW, Linear, Optimizer, ParamsAdamW, VarBuilder, VarMap, linear};
use strapdown_core::Dataset;

use crate::error::{Result, RunError};
use crate::model::SequenceModel;

pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;

pub struct LinearRegressor {
    varmap: VarMap,
    head: Linear,
    optimizer: AdamW,
    device: Device,
    window_len: usize,
    channels: usize,
    label_dim: usize,
}

impl std::fmt::Debug for LinearRegressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearRegressor")
            .field("window_len", &self.window_len)
            .field("channels", &self.channels)
            .field("label_dim", &self.label_dim)
            .finish_non_exhaustive()
    }
}

impl LinearRegressor {
    pub fn new(window_len: usize, channels: usize, label_dim: usize, learning_rate: f64) -> Result<Self> {
        if window_len == 0 || channels == 0 || label_dim == 0 {
            return Err(RunError::config("model dimensions must be positive"));
        }
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let head = linear(window_len * channels, label_dim, vb.pp("head"))?;
        let params = ParamsAdamW {
            lr: learning_rate,
            ..Default::default()
        };
        let optimizer = AdamW::new(varmap.all_vars(), params)?;

        Ok(Self {
            varmap,
            head,
            optimizer,
            device,
            window_len,
            channels,
            label_dim,
        })
    }

    /// Sized for the windows and labels of `dataset`.
    pub fn for_dataset(dataset: &Dataset, learning_rate: f64) -> Result<Self> {
        Self::new(
            dataset.window_len(),
            dataset.channels(),
            dataset.label_dim(),
            learning_rate,
        )
    }

    fn check(&self, data: &Dataset) -> Result<()> {
        let expected = [self.window_len, self.channels, self.label_dim];
        let actual = [data.window_len(), data.channels(), data.label_dim()];
        if expected != actual {
            return Err(RunError::config(format!(
                "model expects windows {expected:?} (len, channels, labels), dataset has {actual:?}"
            )));
        }
        if data.is_empty() {
            return Err(RunError::config("dataset has no windows"));
        }
        Ok(())
    }

    fn tensors(&self, data: &Dataset) -> Result<(Tensor, Tensor)> {
        let (x, y) = data.to_tensors(&self.device)?;
        let x = x
            .to_dtype(DType::F32)?
            .reshape((data.len(), self.window_len * self.channels))?;
        Ok((x, y.to_dtype(DType::F32)?))
    }
}

impl SequenceModel for LinearRegressor {
    fn train_epoch(&mut self, train: &Dataset, batch_size: usize) -> Result<f64> {
        self.check(train)?;
        let mut total = 0.0;
        for batch in train.batches(batch_size) {
            let (x, y) = self.tensors(&batch)?;
            let loss = candle_nn::loss::mse(&self.head.forward(&x)?, &y)?;
            self.optimizer.backward_step(&loss)?;
            total += f64::from(loss.to_scalar::<f32>()?) * batch.len() as f64;
        }
        Ok(total / train.len() as f64)
    }

    fn validation_loss(&self, data: &Dataset) -> Result<f64> {
        self.check(data)?;
        let (x, y) = self.tensors(data)?;
        let loss = candle_nn::loss::mse(&self.head.forward(&x)?, &y)?;
        Ok(f64::from(loss.to_scalar::<f32>()?))
    }

    fn predict(&self, data: &Dataset) -> Result<Vec<f64>> {
        self.check(data)?;
        let (x, _) = self.tensors(data)?;
        Ok(self
            .head
            .forward(&x)?
            .to_dtype(DType::F64)?
            .flatten_all()?
            .to_vec1::<f64>()?)
    }

    fn save_weights(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.varmap.save(path)?;
        Ok(())
    }

    fn load_weights(&mut self, path: &Path) -> Result<()> {
        self.varmap.load(path)?;
        Ok(())
    }
}
