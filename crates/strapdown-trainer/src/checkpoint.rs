//! # Checkpoint Discovery
//!
//! Checkpoints live at `{root}/{model}_{version}/{model}_{epoch}.{ext}` with
//! the epoch zero-padded to a fixed width. Discovery is read-only: nothing
//! here creates or deletes checkpoint files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Default zero-padding width of the epoch field.
pub const DEFAULT_WIDTH: usize = 2;

/// Default checkpoint file extension.
pub const DEFAULT_EXTENSION: &str = "safetensors";

/// How epoch numbers are rendered into checkpoint file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointNaming {
    pub width: usize,
    pub extension: String,
}

impl Default for CheckpointNaming {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl CheckpointNaming {
    pub fn new(width: usize, extension: impl Into<String>) -> Self {
        Self {
            width,
            extension: extension.into(),
        }
    }

    /// `{model}_{epoch:0width}.{ext}`
    pub fn file_name(&self, model_name: &str, epoch: usize) -> String {
        format!(
            "{model_name}_{epoch:0width$}.{ext}",
            width = self.width,
            ext = self.extension
        )
    }

    /// Whether `digits` is exactly how `epoch` would be rendered.
    fn is_canonical(&self, digits: &str, epoch: usize) -> bool {
        digits == format!("{epoch:0width$}", width = self.width)
    }

    fn pattern(&self, model_name: &str) -> Result<Regex> {
        Ok(Regex::new(&format!(
            r"^{}_(\d+)\.{}$",
            regex::escape(model_name),
            regex::escape(&self.extension)
        ))?)
    }
}

/// `{root}/{model}_{version}`
pub fn version_dir(root: &Path, model_name: &str, version: usize) -> PathBuf {
    root.join(format!("{model_name}_{version}"))
}

/// Version numbers of the run directories under `root`, ascending.
///
/// A missing `root` has no versions.
pub fn list_versions(root: &Path, model_name: &str) -> Result<Vec<usize>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = Regex::new(&format!(r"^{}_(\d+)$", regex::escape(model_name)))?;

    let mut versions = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(v) = pattern
            .captures(name)
            .and_then(|caps| caps[1].parse::<usize>().ok())
        {
            versions.push(v);
        }
    }
    versions.sort_unstable();
    debug!(root = %root.display(), model = model_name, ?versions, "scanned run versions");
    Ok(versions)
}

/// One past the highest existing version, or 0 when there is none.
pub fn next_version(root: &Path, model_name: &str) -> Result<usize> {
    Ok(list_versions(root, model_name)?
        .last()
        .map_or(0, |v| v + 1))
}

/// Checkpoints of one run version, ordered by epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointIndex {
    dir: PathBuf,
    entries: BTreeMap<usize, PathBuf>,
}

impl CheckpointIndex {
    /// Index the checkpoint files in `dir`.
    ///
    /// Names whose epoch field is not zero-padded to the configured width
    /// are skipped with a warning. A missing directory yields an empty index.
    pub fn scan(dir: &Path, model_name: &str, naming: &CheckpointNaming) -> Result<Self> {
        let mut entries = BTreeMap::new();
        if !dir.is_dir() {
            return Ok(Self {
                dir: dir.to_path_buf(),
                entries,
            });
        }

        let pattern = naming.pattern(model_name)?;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(caps) = pattern.captures(name) else {
                continue;
            };
            let digits = &caps[1];
            match digits.parse::<usize>() {
                Ok(epoch) if naming.is_canonical(digits, epoch) => {
                    entries.insert(epoch, entry.path());
                }
                _ => warn!(
                    file = name,
                    width = naming.width,
                    "skipping checkpoint with non-canonical epoch field"
                ),
            }
        }
        debug!(dir = %dir.display(), checkpoints = entries.len(), "indexed checkpoints");

        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, epoch: usize) -> Option<&Path> {
        self.entries.get(&epoch).map(PathBuf::as_path)
    }

    /// Highest epoch and its file.
    pub fn latest(&self) -> Option<(usize, &Path)> {
        self.entries
            .iter()
            .next_back()
            .map(|(&e, p)| (e, p.as_path()))
    }

    /// Entry at `position` in epoch order.
    pub fn nth(&self, position: usize) -> Option<(usize, &Path)> {
        self.entries
            .iter()
            .nth(position)
            .map(|(&e, p)| (e, p.as_path()))
    }

    pub fn epochs(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Path)> {
        self.entries.iter().map(|(&e, p)| (e, p.as_path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), b"weights").unwrap();
    }

    #[test]
    fn test_file_name_padding() {
        let naming = CheckpointNaming::default();
        assert_eq!(naming.file_name("modelA", 7), "modelA_07.safetensors");
        assert_eq!(naming.file_name("modelA", 123), "modelA_123.safetensors");
        assert_eq!(CheckpointNaming::new(4, "ext").file_name("m", 3), "m_0003.ext");
    }

    #[test]
    fn test_index_orders_by_epoch() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("modelA_3");
        touch(&dir, "modelA_07.ext");
        touch(&dir, "modelA_12.ext");
        touch(&dir, "modelA_100.ext");

        let index = CheckpointIndex::scan(&dir, "modelA", &CheckpointNaming::new(2, "ext")).unwrap();
        assert_eq!(index.epochs().collect::<Vec<_>>(), vec![7, 12, 100]);
        assert_eq!(index.latest().unwrap().0, 100);
        assert_eq!(index.nth(1).unwrap().1, dir.join("modelA_12.ext"));
        assert!(index.nth(3).is_none());
    }

    #[test]
    fn test_index_ignores_foreign_and_non_canonical_names() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("modelA_0");
        touch(&dir, "modelA_07.ext");
        touch(&dir, "modelA_7.ext");
        touch(&dir, "modelA_007.ext");
        touch(&dir, "modelB_08.ext");
        touch(&dir, "modelA_09.other");
        touch(&dir, "run.json");
        fs::create_dir_all(dir.join("modelA_10.ext")).unwrap();

        let index = CheckpointIndex::scan(&dir, "modelA", &CheckpointNaming::new(2, "ext")).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(7).unwrap(), dir.join("modelA_07.ext"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let index =
            CheckpointIndex::scan(&tmp.path().join("absent"), "modelA", &CheckpointNaming::default()).unwrap();
        assert!(index.is_empty());
        assert!(index.latest().is_none());
    }

    #[test]
    fn test_version_numbering_is_numeric() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(next_version(tmp.path(), "modelA").unwrap(), 0);

        for v in [0, 1, 2, 9] {
            fs::create_dir_all(version_dir(tmp.path(), "modelA", v)).unwrap();
        }
        fs::create_dir_all(tmp.path().join("modelAB_40")).unwrap();
        fs::write(tmp.path().join("modelA_50"), b"not a directory").unwrap();

        assert_eq!(list_versions(tmp.path(), "modelA").unwrap(), vec![0, 1, 2, 9]);
        assert_eq!(next_version(tmp.path(), "modelA").unwrap(), 10);
    }

    #[test]
    fn test_model_name_is_literal() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("mXdel_4")).unwrap();
        fs::create_dir_all(tmp.path().join("m.del_1")).unwrap();
        assert_eq!(next_version(tmp.path(), "m.del").unwrap(), 2);
    }
}
