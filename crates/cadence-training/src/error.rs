//! Error types for the training executor.

use thiserror::Error;

/// Infrastructure failures reported by devices and other external
/// collaborators. Transient failures are retried by [`crate::RetryPolicy`];
/// fatal ones propagate immediately.
#[derive(Debug, Clone, Error)]
pub enum InfraError {
    /// A failure that is expected to clear on retry (preemption, resource
    /// not yet ready).
    #[error("transient infrastructure failure: {0}")]
    Transient(String),

    /// A failure that retrying cannot fix.
    #[error("fatal infrastructure failure: {0}")]
    Fatal(String),
}

/// Errors that can occur while building or running training programs.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// A configuration tree error.
    #[error("Configuration error: {0}")]
    Config(#[from] cadence_core::ConfigError),

    /// A checkpoint error.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] cadence_checkpoint::CheckpointError),

    /// An infrastructure error surfaced outside a retry loop.
    #[error("Infrastructure error: {0}")]
    Infra(#[from] InfraError),

    /// A program's configuration is invalid.
    #[error("Invalid program {name}: {message}")]
    InvalidProgram {
        /// Program name.
        name: String,
        /// What is wrong.
        message: String,
    },

    /// A program subgraph failed to build, or was used before building.
    #[error("Build error in {program}: {message}")]
    Build {
        /// Program name.
        program: String,
        /// What went wrong.
        message: String,
    },

    /// A program step failed at run time.
    #[error("Run error in {program}: {message}")]
    Run {
        /// Program name.
        program: String,
        /// What went wrong.
        message: String,
    },

    /// The retry budget was exhausted by transient failures.
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// The last transient failure.
        #[source]
        source: InfraError,
    },

    /// The task scheduler named a task no schedule is registered for.
    #[error("Unknown task: {task}")]
    UnknownTask {
        /// The unresolved task name.
        task: String,
    },

    /// The executor's schedule/scheduler wiring is inconsistent.
    #[error("Schedule error: {0}")]
    Schedule(String),
}

/// Result type for training operations.
pub type Result<T> = std::result::Result<T, TrainingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrainingError::UnknownTask {
            task: "mnist".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown task: mnist");

        let err = TrainingError::RetriesExhausted {
            attempts: 6,
            source: InfraError::Transient("device busy".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Retries exhausted after 6 attempts: transient infrastructure failure: device busy"
        );
    }
}
