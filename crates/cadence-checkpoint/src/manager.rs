//! Checkpoint manager for tracking and managing checkpoint lifecycle.
//!
//! The manager owns a checkpoint directory: it names files, keeps the
//! manifest current, and applies the retention policy. Retention keeps the
//! newest `max_to_keep` checkpoints; when `keep_every_n_secs` is set, the
//! first checkpoint of each interval is preserved on disk even after it
//! rotates out of the recent window.

use crate::checkpointer::Checkpointer;
use crate::manifest::Manifest;
use crate::state::CheckpointState;
use crate::{CheckpointError, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Information about a saved checkpoint.
#[derive(Debug, Clone)]
pub struct CheckpointInfo {
    /// Path to the checkpoint file.
    pub path: PathBuf,

    /// Global step at which this checkpoint was saved.
    pub global_step: u64,

    /// Timestamp when the checkpoint was created (Unix epoch seconds).
    pub timestamp: u64,
}

/// Configuration for the checkpoint manager.
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Directory where checkpoints are stored.
    pub checkpoint_dir: PathBuf,

    /// Maximum number of recent checkpoints to keep.
    pub max_to_keep: usize,

    /// When set, one checkpoint per interval survives rotation.
    pub keep_every_n_secs: Option<u64>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("checkpoints"),
            max_to_keep: 5,
            keep_every_n_secs: None,
        }
    }
}

impl CheckpointConfig {
    /// Create a new checkpoint configuration.
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of recent checkpoints to keep.
    pub fn with_max_to_keep(mut self, max_to_keep: usize) -> Self {
        self.max_to_keep = max_to_keep;
        self
    }

    /// Preserve one checkpoint per `secs` interval past the recent window.
    pub fn with_keep_every_n_secs(mut self, secs: u64) -> Self {
        self.keep_every_n_secs = Some(secs);
        self
    }
}

/// Manages checkpoint lifecycle: saving, restoring, retention, manifest.
pub struct CheckpointManager<C: Checkpointer> {
    config: CheckpointConfig,
    checkpointer: Arc<C>,

    /// Recent checkpoints subject to rotation, oldest first.
    history: VecDeque<CheckpointInfo>,

    /// Checkpoints preserved by the time-based policy.
    preserved: Vec<CheckpointInfo>,

    /// Timestamp of the last checkpoint preserved by the time-based policy.
    last_preserved_at: Option<u64>,
}

impl<C: Checkpointer> CheckpointManager<C> {
    /// Create a new checkpoint manager.
    pub fn new(config: CheckpointConfig, checkpointer: C) -> Self {
        Self {
            config,
            checkpointer: Arc::new(checkpointer),
            history: VecDeque::new(),
            preserved: Vec::new(),
            last_preserved_at: None,
        }
    }

    /// Get the checkpoint directory.
    pub fn checkpoint_dir(&self) -> &Path {
        &self.config.checkpoint_dir
    }

    /// Number of checkpoints in the rotation window.
    pub fn checkpoint_count(&self) -> usize {
        self.history.len()
    }

    /// Get the configuration.
    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Save a checkpoint, update the manifest, and apply retention.
    pub fn save(&mut self, state: &CheckpointState) -> Result<CheckpointInfo> {
        let stem = format!("ckpt-{}", state.global_step);
        let path = self.config.checkpoint_dir.join(format!("{stem}.json"));

        tracing::info!(
            step = state.global_step,
            path = %path.display(),
            "Saving checkpoint via manager"
        );

        self.checkpointer.save(&path, state)?;

        let info = CheckpointInfo {
            path,
            global_step: state.global_step,
            timestamp: state.timestamp,
        };
        self.history.push_back(info.clone());

        self.cleanup_old()?;
        self.write_manifest(&info)?;

        Ok(info)
    }

    /// Restore the latest checkpoint.
    pub fn restore_latest(&self) -> Result<CheckpointState> {
        let latest_path = self
            .checkpointer
            .latest(&self.config.checkpoint_dir)
            .ok_or_else(|| CheckpointError::NotFound(self.config.checkpoint_dir.clone()))?;

        tracing::info!(path = %latest_path.display(), "Restoring latest checkpoint");

        self.checkpointer.restore(&latest_path)
    }

    /// Restore the latest checkpoint, or `None` when the directory holds no
    /// checkpoint yet.
    pub fn try_restore_latest(&self) -> Result<Option<CheckpointState>> {
        match self.checkpointer.latest(&self.config.checkpoint_dir) {
            Some(path) => self.checkpointer.restore(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Restore a checkpoint by step number.
    pub fn restore_step(&self, step: u64) -> Result<CheckpointState> {
        let path = self
            .config
            .checkpoint_dir
            .join(format!("ckpt-{step}.json"));
        self.checkpointer.restore(&path)
    }

    /// Apply the retention policy to the rotation window.
    ///
    /// The oldest entries past `max_to_keep` are either preserved (when the
    /// time-based policy claims them) or deleted from disk.
    fn cleanup_old(&mut self) -> Result<()> {
        while self.history.len() > self.config.max_to_keep {
            let old = match self.history.pop_front() {
                Some(info) => info,
                None => break,
            };

            if self.should_preserve(&old) {
                tracing::info!(
                    path = %old.path.display(),
                    step = old.global_step,
                    "Preserving checkpoint past the rotation window"
                );
                self.last_preserved_at = Some(old.timestamp);
                self.preserved.push(old);
                continue;
            }

            tracing::info!(
                path = %old.path.display(),
                step = old.global_step,
                "Removing old checkpoint"
            );
            if old.path.exists() {
                std::fs::remove_file(&old.path).map_err(|e| CheckpointError::Io {
                    path: old.path.clone(),
                    source: e,
                })?;
            }
        }
        Ok(())
    }

    fn should_preserve(&self, info: &CheckpointInfo) -> bool {
        let interval = match self.config.keep_every_n_secs {
            Some(secs) => secs,
            None => return false,
        };
        match self.last_preserved_at {
            // The first checkpoint to rotate out anchors the intervals.
            None => true,
            Some(at) => info.timestamp >= at.saturating_add(interval),
        }
    }

    fn write_manifest(&self, latest: &CheckpointInfo) -> Result<()> {
        let mut all: Vec<String> = self
            .preserved
            .iter()
            .chain(self.history.iter())
            .map(|info| format!("ckpt-{}", info.global_step))
            .collect();
        all.sort_by_key(|stem| {
            stem.strip_prefix("ckpt-")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0)
        });
        Manifest::new(format!("ckpt-{}", latest.global_step), all)
            .write(&self.config.checkpoint_dir)
    }

    /// List checkpoints currently on disk, sorted by step number.
    pub fn list_checkpoints(&self) -> Vec<PathBuf> {
        let mut checkpoints: Vec<(u64, PathBuf)> = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.config.checkpoint_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if let Some(step) = path
                    .file_name()
                    .and_then(|f| f.to_str())
                    .and_then(parse_stem_step)
                {
                    checkpoints.push((step, path));
                }
            }
        }
        checkpoints.sort_by_key(|(step, _)| *step);
        checkpoints.into_iter().map(|(_, path)| path).collect()
    }

    /// Initialize the manager by scanning the checkpoint directory.
    ///
    /// On-disk checkpoints enter the rotation window oldest first, so a
    /// restarted run resumes the same retention behavior.
    pub fn initialize(&mut self) -> Result<()> {
        self.history.clear();
        self.preserved.clear();
        self.last_preserved_at = None;

        if !self.config.checkpoint_dir.exists() {
            return Ok(());
        }

        for path in self.list_checkpoints() {
            let step = path
                .file_name()
                .and_then(|f| f.to_str())
                .and_then(parse_stem_step)
                .unwrap_or(0);
            self.history.push_back(CheckpointInfo {
                path,
                global_step: step,
                // Unknown for pre-existing files; time-based retention
                // restarts from the next save.
                timestamp: 0,
            });
        }

        tracing::info!(
            count = self.history.len(),
            dir = %self.config.checkpoint_dir.display(),
            "Initialized checkpoint manager"
        );

        Ok(())
    }
}

fn parse_stem_step(filename: &str) -> Option<u64> {
    filename
        .strip_prefix("ckpt-")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpointer::JsonCheckpointer;
    use crate::manifest::Manifest;
    use tempfile::tempdir;

    #[test]
    fn test_config_builder() {
        let config = CheckpointConfig::new("/tmp/ckpts")
            .with_max_to_keep(10)
            .with_keep_every_n_secs(3600);
        assert_eq!(config.checkpoint_dir, PathBuf::from("/tmp/ckpts"));
        assert_eq!(config.max_to_keep, 10);
        assert_eq!(config.keep_every_n_secs, Some(3600));
    }

    #[test]
    fn test_save_writes_manifest() {
        let dir = tempdir().unwrap();
        let config = CheckpointConfig::new(dir.path()).with_max_to_keep(3);
        let mut manager = CheckpointManager::new(config, JsonCheckpointer::new());

        let info = manager.save(&CheckpointState::new(1000)).unwrap();
        assert_eq!(info.global_step, 1000);
        assert!(info.path.exists());

        let manifest = Manifest::read(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.latest, "ckpt-1000");
        assert_eq!(manifest.all, vec!["ckpt-1000".to_string()]);
    }

    #[test]
    fn test_rotation_deletes_old_checkpoints() {
        let dir = tempdir().unwrap();
        let config = CheckpointConfig::new(dir.path()).with_max_to_keep(2);
        let mut manager = CheckpointManager::new(config, JsonCheckpointer::new());

        for step in [100, 200, 300, 400] {
            manager.save(&CheckpointState::new(step)).unwrap();
        }

        assert_eq!(manager.checkpoint_count(), 2);
        assert!(!dir.path().join("ckpt-100.json").exists());
        assert!(!dir.path().join("ckpt-200.json").exists());
        assert!(dir.path().join("ckpt-300.json").exists());
        assert!(dir.path().join("ckpt-400.json").exists());

        let manifest = Manifest::read(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.latest, "ckpt-400");
        assert_eq!(
            manifest.all,
            vec!["ckpt-300".to_string(), "ckpt-400".to_string()]
        );
    }

    #[test]
    fn test_time_based_retention_preserves_interval_checkpoints() {
        let dir = tempdir().unwrap();
        let config = CheckpointConfig::new(dir.path())
            .with_max_to_keep(1)
            .with_keep_every_n_secs(100);
        let mut manager = CheckpointManager::new(config, JsonCheckpointer::new());

        // One save every 60 simulated seconds.
        for (i, step) in [100_u64, 200, 300, 400, 500].iter().enumerate() {
            let state = CheckpointState::with_timestamp(*step, 1000 + 60 * i as u64);
            manager.save(&state).unwrap();
        }

        // ckpt-100 (t=1000) anchors the intervals; ckpt-200 (t=1060) is
        // inside the first interval and rotates out; ckpt-300 (t=1120)
        // starts the next interval; ckpt-400 (t=1180) rotates out.
        assert!(dir.path().join("ckpt-100.json").exists());
        assert!(!dir.path().join("ckpt-200.json").exists());
        assert!(dir.path().join("ckpt-300.json").exists());
        assert!(!dir.path().join("ckpt-400.json").exists());
        assert!(dir.path().join("ckpt-500.json").exists());

        let manifest = Manifest::read(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.latest, "ckpt-500");
        assert_eq!(
            manifest.all,
            vec![
                "ckpt-100".to_string(),
                "ckpt-300".to_string(),
                "ckpt-500".to_string()
            ]
        );
    }

    #[test]
    fn test_restore_latest_and_step() {
        let dir = tempdir().unwrap();
        let config = CheckpointConfig::new(dir.path());
        let mut manager = CheckpointManager::new(config, JsonCheckpointer::new());

        for step in [100, 500, 300] {
            manager.save(&CheckpointState::new(step)).unwrap();
        }

        // The manifest names the last save, not the highest step.
        let restored = manager.restore_latest().unwrap();
        assert_eq!(restored.global_step, 300);

        let restored = manager.restore_step(500).unwrap();
        assert_eq!(restored.global_step, 500);
    }

    #[test]
    fn test_try_restore_latest_empty() {
        let dir = tempdir().unwrap();
        let manager =
            CheckpointManager::new(CheckpointConfig::new(dir.path()), JsonCheckpointer::new());
        assert!(manager.try_restore_latest().unwrap().is_none());
        assert!(matches!(
            manager.restore_latest(),
            Err(CheckpointError::NotFound(_))
        ));
    }

    #[test]
    fn test_initialize_rebuilds_history() {
        let dir = tempdir().unwrap();

        {
            let config = CheckpointConfig::new(dir.path());
            let mut manager = CheckpointManager::new(config, JsonCheckpointer::new());
            for step in [100, 200, 300] {
                manager.save(&CheckpointState::new(step)).unwrap();
            }
        }

        let config = CheckpointConfig::new(dir.path());
        let mut manager = CheckpointManager::new(config, JsonCheckpointer::new());
        manager.initialize().unwrap();
        assert_eq!(manager.checkpoint_count(), 3);

        let checkpoints = manager.list_checkpoints();
        assert_eq!(checkpoints.len(), 3);
        assert!(checkpoints[0].to_str().unwrap().contains("ckpt-100"));
        assert!(checkpoints[2].to_str().unwrap().contains("ckpt-300"));
    }
}
