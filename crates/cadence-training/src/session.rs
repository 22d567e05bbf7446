//! Training sessions and the device seam.
//!
//! A [`Session`] is the explicit context threaded through subgraph building,
//! restore, and program execution: it owns the device handle, the global
//! step counter, and the named variable store. There is no global state;
//! everything a program touches travels through `&mut Session`.

use std::collections::BTreeMap;

use cadence_checkpoint::CheckpointState;

use crate::error::InfraError;

/// An opaque accelerator or resource a session runs against.
///
/// `initialize` is called before the first program runs and may fail
/// transiently while the resource warms up; the executor retries it under
/// its [`crate::RetryPolicy`].
pub trait Device: Send {
    /// Human-readable device name for logs.
    fn name(&self) -> &str;

    /// Bring the device up. Transient failures are retriable.
    fn initialize(&mut self) -> std::result::Result<(), InfraError>;

    /// Whether the device finished initializing.
    fn is_ready(&self) -> bool;
}

/// In-process device used for local runs and tests.
///
/// Can be configured to fail transiently a fixed number of times before
/// coming up, which is how retry behavior is exercised.
#[derive(Debug, Default)]
pub struct LocalDevice {
    ready: bool,
    transient_failures_remaining: u32,
}

impl LocalDevice {
    /// A device that initializes on the first attempt.
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that reports `Transient` for the first `n` initialization
    /// attempts, then succeeds.
    pub fn with_transient_failures(n: u32) -> Self {
        Self {
            ready: false,
            transient_failures_remaining: n,
        }
    }
}

impl Device for LocalDevice {
    fn name(&self) -> &str {
        "local"
    }

    fn initialize(&mut self) -> std::result::Result<(), InfraError> {
        if self.transient_failures_remaining > 0 {
            self.transient_failures_remaining -= 1;
            return Err(InfraError::Transient("device not ready".to_string()));
        }
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

/// Mutable training context: device, global step, and variables.
pub struct Session {
    device: Box<dyn Device>,
    global_step: u64,
    variables: BTreeMap<String, Vec<f32>>,
}

impl Session {
    /// Creates a session on the given device with step zero and no
    /// variables.
    pub fn new(device: Box<dyn Device>) -> Self {
        Self {
            device,
            global_step: 0,
            variables: BTreeMap::new(),
        }
    }

    /// The current global step.
    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Advances the global step by `n`.
    pub fn advance_step(&mut self, n: u64) {
        self.global_step += n;
    }

    /// The session's device.
    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    /// Mutable access to the device, for initialization.
    pub fn device_mut(&mut self) -> &mut dyn Device {
        self.device.as_mut()
    }

    /// Sets a named variable.
    pub fn set_variable(&mut self, name: impl Into<String>, values: Vec<f32>) {
        self.variables.insert(name.into(), values);
    }

    /// Reads a named variable.
    pub fn variable(&self, name: &str) -> Option<&[f32]> {
        self.variables.get(name).map(Vec::as_slice)
    }

    /// Number of stored variables.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Captures the session's saveable state.
    pub fn snapshot(&self) -> CheckpointState {
        let mut state = CheckpointState::new(self.global_step);
        for (name, values) in &self.variables {
            state.set_variable(name.clone(), values.clone());
        }
        state
    }

    /// Replaces the session's step and variables with a saved state.
    pub fn restore(&mut self, state: &CheckpointState) {
        self.global_step = state.global_step;
        self.variables = state.variables.clone();
        tracing::info!(step = self.global_step, "Session restored from checkpoint");
    }
}
