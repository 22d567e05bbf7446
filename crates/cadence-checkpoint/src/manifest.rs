//! The `checkpoint` manifest file.
//!
//! Each checkpoint directory carries a plain-text manifest that names the
//! latest checkpoint and every checkpoint still on disk:
//!
//! ```text
//! model_checkpoint_path: "ckpt-400"
//! all_model_checkpoint_paths: "ckpt-300"
//! all_model_checkpoint_paths: "ckpt-400"
//! ```
//!
//! The entries are file stems relative to the directory, the same
//! convention readers of TensorFlow checkpoint directories expect.

use std::path::Path;

use crate::{CheckpointError, Result};

pub const MANIFEST_FILE: &str = "checkpoint";

const LATEST_KEY: &str = "model_checkpoint_path";
const ALL_KEY: &str = "all_model_checkpoint_paths";

/// Parsed contents of a manifest file.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Stem of the newest checkpoint.
    pub latest: String,
    /// Stems of every checkpoint the directory holds, oldest first.
    pub all: Vec<String>,
}

impl Manifest {
    pub fn new(latest: impl Into<String>, all: Vec<String>) -> Self {
        Self {
            latest: latest.into(),
            all,
        }
    }

    /// Reads the manifest from a checkpoint directory. Returns `Ok(None)`
    /// when the directory has no manifest yet.
    pub fn read(dir: &Path) -> Result<Option<Manifest>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| CheckpointError::Io {
            path: path.clone(),
            source: e,
        })?;
        let mut latest = None;
        let mut all = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| {
                CheckpointError::Manifest(format!("malformed manifest line: {line}"))
            })?;
            let value = value.trim().trim_matches('"').to_string();
            match key.trim() {
                LATEST_KEY => latest = Some(value),
                ALL_KEY => all.push(value),
                other => {
                    return Err(CheckpointError::Manifest(format!(
                        "unknown manifest key: {other}"
                    )))
                }
            }
        }
        let latest = latest.ok_or_else(|| {
            CheckpointError::Manifest(format!("manifest at {} names no latest checkpoint", path.display()))
        })?;
        Ok(Some(Manifest { latest, all }))
    }

    /// Writes the manifest into a checkpoint directory.
    ///
    /// The file is written to a temporary sibling and renamed into place,
    /// so readers never observe a partially written manifest.
    pub fn write(&self, dir: &Path) -> Result<()> {
        let mut text = format!("{LATEST_KEY}: \"{}\"\n", self.latest);
        for stem in &self.all {
            text.push_str(&format!("{ALL_KEY}: \"{stem}\"\n"));
        }
        let path = dir.join(MANIFEST_FILE);
        let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
        std::fs::write(&tmp, text).map_err(|e| CheckpointError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| CheckpointError::Io {
            path,
            source: e,
        })?;
        Ok(())
    }
}
