//! Checkpoint persistence and retention for Cadence.
//!
//! This crate provides functionality for:
//!
//! - **Save/Restore**: persist session state to disk and restore it
//! - **Retention**: rotate old checkpoints while preserving one per
//!   configured time interval
//! - **Manifest**: a plain-text `checkpoint` file naming the latest and
//!   every retained checkpoint
//!
//! # Core Components
//!
//! - [`Checkpointer`]: trait for checkpoint serialization implementations
//! - [`CheckpointManager`]: manages checkpoint lifecycle (save, restore,
//!   retention, manifest)
//! - [`CheckpointState`]: the saveable session state
//!
//! # Examples
//!
//! ```no_run
//! use cadence_checkpoint::{
//!     CheckpointConfig, CheckpointManager, CheckpointState, JsonCheckpointer,
//! };
//!
//! fn main() -> cadence_checkpoint::Result<()> {
//!     let config = CheckpointConfig::new("/tmp/checkpoints")
//!         .with_max_to_keep(5)
//!         .with_keep_every_n_secs(3600);
//!     let mut manager = CheckpointManager::new(config, JsonCheckpointer::new());
//!
//!     let state = CheckpointState::new(1000);
//!     manager.save(&state)?;
//!
//!     let restored = manager.restore_latest()?;
//!     assert_eq!(restored.global_step, 1000);
//!     Ok(())
//! }
//! ```
//!
//! # Atomicity
//!
//! Both checkpoint files and the manifest are written to a temporary
//! sibling and renamed into place, so a concurrent reader of the directory
//! never observes a partially written file.

pub mod checkpointer;
pub mod manager;
pub mod manifest;
pub mod state;

// Re-export main types
pub use checkpointer::{Checkpointer, JsonCheckpointer};
pub use manager::{CheckpointConfig, CheckpointInfo, CheckpointManager};
pub use manifest::{Manifest, MANIFEST_FILE};
pub use state::CheckpointState;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during checkpoint operations.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// I/O error during checkpoint operations.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Checkpoint file not found.
    #[error("Checkpoint not found: {0}")]
    NotFound(PathBuf),

    /// Error during serialization.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Error during deserialization.
    #[error("Deserialization error: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Malformed or inconsistent manifest file.
    #[error("Manifest error: {0}")]
    Manifest(String),
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;
