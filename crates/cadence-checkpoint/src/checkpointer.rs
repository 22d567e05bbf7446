//! Checkpointer trait for save/restore operations.
//!
//! This module defines the core `Checkpointer` trait that all checkpoint
//! implementations must satisfy, plus the JSON implementation used by the
//! training executor.

use crate::manifest::Manifest;
use crate::state::CheckpointState;
use crate::{CheckpointError, Result};
use std::path::{Path, PathBuf};

/// Trait for checkpoint serialization and deserialization.
///
/// Implementors provide the logic for persisting session state. The save
/// side must publish atomically: a reader that lists the directory at any
/// moment sees either the previous checkpoint or the new one, never a
/// partial file.
pub trait Checkpointer: Send + Sync {
    /// Save state to the specified path.
    fn save(&self, path: &Path, state: &CheckpointState) -> Result<()>;

    /// Restore state from the specified path.
    fn restore(&self, path: &Path) -> Result<CheckpointState>;

    /// Find the latest checkpoint in a directory.
    ///
    /// Resolves through the directory manifest when one exists, otherwise
    /// falls back to scanning for the highest step number.
    fn latest(&self, dir: &Path) -> Option<PathBuf>;
}

/// JSON-based checkpoint implementation.
///
/// Files are named `ckpt-<step>.json`. Writes go to a `.tmp` sibling first
/// and are renamed into place.
#[derive(Debug, Clone, Default)]
pub struct JsonCheckpointer {
    /// Whether to pretty-print JSON output.
    pub pretty: bool,
}

impl JsonCheckpointer {
    /// Create a new JSON checkpointer.
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Create a new JSON checkpointer with pretty printing.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// The file stem for a given step, as recorded in the manifest.
    pub fn checkpoint_stem(step: u64) -> String {
        format!("ckpt-{}", step)
    }

    /// The checkpoint filename for a given step.
    pub fn checkpoint_filename(step: u64) -> String {
        format!("ckpt-{}.json", step)
    }

    /// Parse the step number from a checkpoint filename.
    pub fn parse_step(filename: &str) -> Option<u64> {
        filename
            .strip_prefix("ckpt-")?
            .strip_suffix(".json")?
            .parse()
            .ok()
    }
}

impl Checkpointer for JsonCheckpointer {
    fn save(&self, path: &Path, state: &CheckpointState) -> Result<()> {
        tracing::info!(path = %path.display(), step = state.global_step, "Saving checkpoint");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = if self.pretty {
            serde_json::to_string_pretty(state)
        } else {
            serde_json::to_string(state)
        }
        .map_err(CheckpointError::Serialization)?;

        // Publish atomically: write a temporary sibling, then rename.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| CheckpointError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, path).map_err(|e| CheckpointError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(
            path = %path.display(),
            size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            "Checkpoint saved"
        );

        Ok(())
    }

    fn restore(&self, path: &Path) -> Result<CheckpointState> {
        tracing::info!(path = %path.display(), "Restoring checkpoint");

        if !path.exists() {
            return Err(CheckpointError::NotFound(path.to_path_buf()));
        }

        let json = std::fs::read_to_string(path).map_err(|e| CheckpointError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let state: CheckpointState =
            serde_json::from_str(&json).map_err(CheckpointError::Deserialization)?;

        tracing::info!(
            path = %path.display(),
            step = state.global_step,
            variables = state.len(),
            "Checkpoint restored"
        );

        Ok(state)
    }

    fn latest(&self, dir: &Path) -> Option<PathBuf> {
        if !dir.is_dir() {
            return None;
        }

        // The manifest is authoritative when present and intact.
        if let Ok(Some(manifest)) = Manifest::read(dir) {
            let path = dir.join(format!("{}.json", manifest.latest));
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(
                stem = %manifest.latest,
                "Manifest names a missing checkpoint; falling back to scan"
            );
        }

        let mut latest: Option<(u64, PathBuf)> = None;
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if let Some(filename) = path.file_name().and_then(|f| f.to_str()) {
                    if let Some(step) = Self::parse_step(filename) {
                        if latest.as_ref().map(|(s, _)| step >= *s).unwrap_or(true) {
                            latest = Some((step, path));
                        }
                    }
                }
            }
        }

        latest.map(|(_, path)| path)
    }
}
