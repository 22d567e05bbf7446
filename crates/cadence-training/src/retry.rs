//! Retry policy for transient infrastructure failures.
//!
//! The policy is an explicit object handed to the executor, so tests and
//! callers choose the budget and backoff rather than relying on built-in
//! defaults scattered through the call sites.

use std::time::Duration;

use crate::error::{InfraError, Result, TrainingError};

/// Bounded exponential backoff over transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    /// Sleep before the second attempt.
    pub initial_backoff: Duration,
    /// Growth factor applied after every failed attempt.
    pub backoff_multiplier: f64,
    /// Upper bound on a single sleep.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Sets the attempt budget.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial backoff.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Sets the backoff growth factor.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the backoff ceiling.
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Runs `op`, retrying while it fails transiently.
    ///
    /// Fatal errors propagate on the spot. When the attempt budget runs out
    /// the last transient failure escalates to
    /// [`TrainingError::RetriesExhausted`].
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, InfraError>,
    {
        let mut backoff = self.initial_backoff;
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(err @ InfraError::Fatal(_)) => return Err(TrainingError::Infra(err)),
                Err(err @ InfraError::Transient(_)) => {
                    if attempt == attempts {
                        return Err(TrainingError::RetriesExhausted {
                            attempts,
                            source: err,
                        });
                    }
                    tracing::warn!(
                        what,
                        attempt,
                        max_attempts = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    std::thread::sleep(backoff);
                    backoff = Duration::from_secs_f64(
                        (backoff.as_secs_f64() * self.backoff_multiplier)
                            .min(self.max_backoff.as_secs_f64()),
                    );
                }
            }
        }
        unreachable!("retry loop always returns within the attempt budget")
    }
}
