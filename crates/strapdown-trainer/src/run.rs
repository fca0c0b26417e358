//! # Run Manager
//!
//! Lifecycle of one training run as an explicit state machine:
//!
//! ```text
//! NoRun ──start_fresh──▶ Fresh ──begin_training──▶ Training ──finish──▶ Terminal
//!   │                      │                          ▲
//!   ├───────resume─────────┴──▶ Resumed ──begin_training
//!   │
//!   └──open──▶ Opened (read-only)
//! ```
//!
//! Every transition method checks the current state and returns
//! [`RunError::InvalidTransition`] instead of guessing. Existing checkpoints
//! are never overwritten: resuming from an older checkpoint branches into a
//! new version, and [`RunManager::checkpoint_path`] refuses epochs that
//! already have weights on disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checkpoint::{CheckpointIndex, CheckpointNaming, next_version, version_dir};
use crate::error::{Result, RunError};
use crate::manifest::{BranchOrigin, EpochRecord, RunManifest};

/// Why training ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The configured number of epochs ran to completion.
    EpochBudget,
    /// A callback asked to stop, typically early stopping.
    EarlyStopping,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    NoRun,
    /// Bound to a version for inspection only.
    Opened {
        version: usize,
    },
    Fresh {
        version: usize,
    },
    Resumed {
        version: usize,
        checkpoint: PathBuf,
        epoch: usize,
    },
    Training {
        version: usize,
        /// Last completed epoch.
        epoch: usize,
    },
    Terminal {
        version: usize,
        last_epoch: usize,
        reason: StopReason,
    },
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::NoRun => "not started",
            RunState::Opened { .. } => "read-only",
            RunState::Fresh { .. } => "fresh",
            RunState::Resumed { .. } => "resumed",
            RunState::Training { .. } => "training",
            RunState::Terminal { .. } => "terminal",
        }
    }

    pub fn version(&self) -> Option<usize> {
        match *self {
            RunState::NoRun => None,
            RunState::Opened { version }
            | RunState::Fresh { version }
            | RunState::Resumed { version, .. }
            | RunState::Training { version, .. }
            | RunState::Terminal { version, .. } => Some(version),
        }
    }
}

/// Which run to continue, and from which checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeRequest {
    pub version: usize,
    /// Position in epoch order. `None` picks the latest checkpoint.
    pub position: Option<usize>,
}

impl ResumeRequest {
    pub fn latest(version: usize) -> Self {
        Self {
            version,
            position: None,
        }
    }

    pub fn at(version: usize, position: usize) -> Self {
        Self {
            version,
            position: Some(position),
        }
    }
}

/// Owns the versioned checkpoint directories of one model.
#[derive(Debug)]
pub struct RunManager {
    root: PathBuf,
    model_name: String,
    naming: CheckpointNaming,
    state: RunState,
    manifest: Option<RunManifest>,
}

impl RunManager {
    pub fn new(root: impl Into<PathBuf>, model_name: impl Into<String>, naming: CheckpointNaming) -> Self {
        Self {
            root: root.into(),
            model_name: model_name.into(),
            naming,
            state: RunState::NoRun,
            manifest: None,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn naming(&self) -> &CheckpointNaming {
        &self.naming
    }

    pub fn manifest(&self) -> Option<&RunManifest> {
        self.manifest.as_ref()
    }

    /// Directory of the bound run version.
    pub fn version_dir(&self) -> Option<PathBuf> {
        self.state
            .version()
            .map(|v| version_dir(&self.root, &self.model_name, v))
    }

    fn invalid(&self, action: &'static str) -> RunError {
        RunError::InvalidTransition {
            from: self.state.name(),
            action,
        }
    }

    fn bound_dir(&self, action: &'static str) -> Result<PathBuf> {
        self.version_dir().ok_or_else(|| self.invalid(action))
    }

    /// Create the next unused version directory.
    pub fn start_fresh(&mut self) -> Result<usize> {
        if self.state != RunState::NoRun {
            return Err(self.invalid("start a fresh run"));
        }

        let version = next_version(&self.root, &self.model_name)?;
        let dir = version_dir(&self.root, &self.model_name, version);
        fs::create_dir_all(&dir)?;

        let manifest = RunManifest::new(&self.model_name, version);
        manifest.save(&dir)?;
        self.manifest = Some(manifest);
        self.state = RunState::Fresh { version };

        info!(model = %self.model_name, version, dir = %dir.display(), "started fresh run");
        Ok(version)
    }

    /// Bind to an existing version without preparing to train it. The
    /// checkpoints can be listed and ranked, nothing can be written.
    pub fn open(&mut self, version: usize) -> Result<()> {
        if self.state != RunState::NoRun {
            return Err(self.invalid("open a run"));
        }
        let dir = version_dir(&self.root, &self.model_name, version);
        if !dir.is_dir() {
            return Err(RunError::CheckpointNotFound { dir });
        }
        self.manifest = RunManifest::load(&dir)?;
        self.state = RunState::Opened { version };
        Ok(())
    }

    /// Bind to an existing version and select the checkpoint to restore.
    ///
    /// Returns the selected epoch and file. Fails with
    /// [`RunError::CheckpointNotFound`] when nothing matches, leaving the
    /// state untouched.
    pub fn resume(&mut self, version: usize, position: Option<usize>) -> Result<(usize, PathBuf)> {
        if !matches!(self.state, RunState::NoRun | RunState::Fresh { .. }) {
            return Err(self.invalid("resume"));
        }

        let dir = version_dir(&self.root, &self.model_name, version);
        let index = CheckpointIndex::scan(&dir, &self.model_name, &self.naming)?;
        let selected = match position {
            Some(p) => index.nth(p),
            None => index.latest(),
        };
        let Some((epoch, checkpoint)) = selected.map(|(e, p)| (e, p.to_path_buf())) else {
            return Err(RunError::CheckpointNotFound { dir });
        };

        let manifest = RunManifest::load(&dir)?.unwrap_or_else(|| RunManifest::new(&self.model_name, version));
        self.manifest = Some(manifest);
        self.state = RunState::Resumed {
            version,
            checkpoint: checkpoint.clone(),
            epoch,
        };

        info!(
            model = %self.model_name,
            version,
            epoch,
            checkpoint = %checkpoint.display(),
            "resuming run"
        );
        Ok((epoch, checkpoint))
    }

    /// Resume when requested, falling back to a fresh run when the requested
    /// version has no checkpoints.
    ///
    /// Resuming from a checkpoint older than the version's latest branches
    /// into a new version seeded from that checkpoint, so the later epochs
    /// of the original run stay intact.
    pub fn start_or_resume(&mut self, request: Option<ResumeRequest>) -> Result<&RunState> {
        if let Some(req) = request {
            match self.resume(req.version, req.position) {
                Ok((epoch, _)) => {
                    let latest = self.checkpoints()?.latest().map(|(e, _)| e);
                    if latest.is_some_and(|latest| latest > epoch) {
                        self.branch()?;
                    }
                    return Ok(&self.state);
                }
                Err(RunError::CheckpointNotFound { dir }) => {
                    warn!(
                        dir = %dir.display(),
                        "no checkpoint to resume from, starting a fresh run"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        self.start_fresh()?;
        Ok(&self.state)
    }

    /// Move a resumed run into a new version that starts from the selected
    /// checkpoint, carrying over the history up to that epoch.
    fn branch(&mut self) -> Result<()> {
        let RunState::Resumed {
            version: parent,
            checkpoint,
            epoch,
        } = self.state.clone()
        else {
            return Err(self.invalid("branch"));
        };

        let version = next_version(&self.root, &self.model_name)?;
        let dir = version_dir(&self.root, &self.model_name, version);
        fs::create_dir_all(&dir)?;

        let mut manifest = RunManifest::new(&self.model_name, version).with_origin(BranchOrigin {
            version: parent,
            epoch,
        });
        if let Some(previous) = &self.manifest {
            for record in previous.history.iter().filter(|r| r.epoch <= epoch) {
                manifest.record(record.clone());
            }
        }
        manifest.save(&dir)?;
        self.manifest = Some(manifest);
        self.state = RunState::Resumed {
            version,
            checkpoint,
            epoch,
        };

        info!(model = %self.model_name, parent, epoch, version, "branched run from an earlier checkpoint");
        Ok(())
    }

    /// Hand control to the training loop. Returns the last completed epoch,
    /// 0 for a fresh run.
    pub fn begin_training(&mut self) -> Result<usize> {
        let (version, epoch) = match self.state {
            RunState::Fresh { version } => (version, 0),
            RunState::Resumed { version, epoch, .. } => (version, epoch),
            _ => return Err(self.invalid("begin training")),
        };
        self.state = RunState::Training { version, epoch };
        Ok(epoch)
    }

    /// Record a completed epoch and rewrite the run manifest.
    pub fn record_epoch(&mut self, record: EpochRecord) -> Result<()> {
        let RunState::Training { version, epoch } = self.state else {
            return Err(self.invalid("record an epoch"));
        };
        if record.epoch <= epoch {
            return Err(RunError::config(format!(
                "epoch {} does not advance past {epoch}",
                record.epoch
            )));
        }

        let dir = version_dir(&self.root, &self.model_name, version);
        let next = record.epoch;
        let mut manifest = self
            .manifest
            .clone()
            .unwrap_or_else(|| RunManifest::new(&self.model_name, version));
        manifest.record(record);
        manifest.save(&dir)?;

        self.manifest = Some(manifest);
        self.state = RunState::Training {
            version,
            epoch: next,
        };
        Ok(())
    }

    /// Where the weights for `epoch` of the training run belong. Fails with
    /// [`RunError::CheckpointExists`] when that file is already on disk.
    pub fn checkpoint_path(&self, epoch: usize) -> Result<PathBuf> {
        if !matches!(self.state, RunState::Training { .. }) {
            return Err(self.invalid("name a checkpoint"));
        }
        let dir = self.bound_dir("name a checkpoint")?;
        let path = dir.join(self.naming.file_name(&self.model_name, epoch));
        if path.exists() {
            return Err(RunError::CheckpointExists { path });
        }
        Ok(path)
    }

    pub fn finish(&mut self, reason: StopReason) -> Result<()> {
        let RunState::Training { version, epoch } = self.state else {
            return Err(self.invalid("finish"));
        };
        self.state = RunState::Terminal {
            version,
            last_epoch: epoch,
            reason,
        };
        info!(model = %self.model_name, version, last_epoch = epoch, ?reason, "run finished");
        Ok(())
    }

    /// Checkpoints currently on disk for the bound version.
    pub fn checkpoints(&self) -> Result<CheckpointIndex> {
        let dir = self.bound_dir("list checkpoints")?;
        CheckpointIndex::scan(&dir, &self.model_name, &self.naming)
    }

    pub fn latest_checkpoint(&self) -> Result<Option<(usize, PathBuf)>> {
        Ok(self
            .checkpoints()?
            .latest()
            .map(|(e, p)| (e, p.to_path_buf())))
    }

    /// The existing checkpoint with the lowest recorded validation loss,
    /// or the latest one when no losses were recorded for any of them.
    pub fn best_checkpoint(&self) -> Result<Option<(usize, PathBuf)>> {
        let index = self.checkpoints()?;
        let best = self.manifest.as_ref().and_then(|m| {
            m.ranked_by_validation()
                .into_iter()
                .find_map(|r| index.get(r.epoch).map(|p| (r.epoch, p.to_path_buf())))
        });
        Ok(best.or_else(|| index.latest().map(|(e, p)| (e, p.to_path_buf()))))
    }
}

/// Load the manifest of an arbitrary version without binding a manager.
pub fn read_manifest(root: &Path, model_name: &str, version: usize) -> Result<Option<RunManifest>> {
    RunManifest::load(&version_dir(root, model_name, version))
}
