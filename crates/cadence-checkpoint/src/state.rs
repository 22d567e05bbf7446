//! Checkpoint state representation.
//!
//! This module defines the structure that represents all saveable state in
//! a training session: the global step, named variables, and metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete session state for checkpointing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Version of the checkpoint format.
    pub version: u32,

    /// Global training step at checkpoint time.
    pub global_step: u64,

    /// Timestamp when the state was captured (Unix epoch seconds).
    pub timestamp: u64,

    /// Named variables, values are flattened tensors.
    pub variables: BTreeMap<String, Vec<f32>>,

    /// Additional metadata about the run.
    pub metadata: BTreeMap<String, String>,
}

impl CheckpointState {
    /// Create a new empty state at the given global step, timestamped now.
    pub fn new(global_step: u64) -> Self {
        Self {
            version: 1,
            global_step,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            variables: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create a state with an explicit timestamp.
    pub fn with_timestamp(global_step: u64, timestamp: u64) -> Self {
        Self {
            timestamp,
            ..Self::new(global_step)
        }
    }

    /// Set a named variable.
    pub fn set_variable(&mut self, name: impl Into<String>, values: Vec<f32>) {
        self.variables.insert(name.into(), values);
    }

    /// Get a named variable, if present.
    pub fn variable(&self, name: &str) -> Option<&[f32]> {
        self.variables.get(name).map(Vec::as_slice)
    }

    /// Set a metadata value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Number of stored variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Check if the state holds no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
