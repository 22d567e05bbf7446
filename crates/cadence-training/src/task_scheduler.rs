//! Task schedulers for multi-task training.
//!
//! When an executor drives more than one task, a scheduler picks which
//! task's schedule runs next. Sampling is a pure function of the scheduler's
//! configuration and the global step, so a run that restarts from a
//! checkpoint re-draws exactly the same task sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, TrainingError};

// Mixes the step into the seed; splitmix64's increment keeps neighboring
// steps from producing correlated streams.
const STEP_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Picks the task to run at a given global step.
pub trait TaskScheduler: Send {
    /// Returns the task name to run at `global_step`.
    fn sample(&self, global_step: u64) -> String;

    /// All task names this scheduler can emit.
    fn task_names(&self) -> Vec<String>;
}

/// Samples from a fixed categorical distribution over tasks.
#[derive(Debug, Clone)]
pub struct ConstantScheduler {
    tasks: Vec<String>,
    /// Cumulative distribution, last entry is 1.0.
    cumulative: Vec<f64>,
    seed: u64,
}

impl ConstantScheduler {
    /// Builds a scheduler from `(task, weight)` pairs.
    ///
    /// Weights must be positive; they are normalized into probabilities.
    pub fn new(weighted_tasks: Vec<(String, f64)>, seed: u64) -> Result<Self> {
        if weighted_tasks.is_empty() {
            return Err(TrainingError::Schedule(
                "task scheduler needs at least one task".to_string(),
            ));
        }
        let total: f64 = weighted_tasks.iter().map(|(_, w)| w).sum();
        if weighted_tasks.iter().any(|(_, w)| *w <= 0.0) || !total.is_finite() {
            return Err(TrainingError::Schedule(
                "task weights must be positive and finite".to_string(),
            ));
        }
        let mut tasks = Vec::with_capacity(weighted_tasks.len());
        let mut cumulative = Vec::with_capacity(weighted_tasks.len());
        let mut acc = 0.0;
        for (task, weight) in weighted_tasks {
            acc += weight / total;
            tasks.push(task);
            cumulative.push(acc);
        }
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }
        Ok(Self {
            tasks,
            cumulative,
            seed,
        })
    }
}

impl TaskScheduler for ConstantScheduler {
    fn sample(&self, global_step: u64) -> String {
        let mut rng = StdRng::seed_from_u64(self.seed ^ global_step.wrapping_mul(STEP_MIX));
        let draw: f64 = rng.gen();
        for (task, bound) in self.tasks.iter().zip(&self.cumulative) {
            if draw < *bound {
                return task.clone();
            }
        }
        // draw == 1.0 cannot happen with gen(), but stay total anyway.
        self.tasks
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn task_names(&self) -> Vec<String> {
        self.tasks.clone()
    }
}

/// Switches between constant distributions at global-step boundaries.
///
/// With boundaries `[b0, b1]` and distributions `[d0, d1, d2]`, steps below
/// `b0` draw from `d0`, steps in `[b0, b1)` from `d1`, and steps at or above
/// `b1` from `d2`.
#[derive(Debug, Clone)]
pub struct PiecewiseScheduler {
    boundaries: Vec<u64>,
    schedulers: Vec<ConstantScheduler>,
}

impl PiecewiseScheduler {
    pub fn new(boundaries: Vec<u64>, schedulers: Vec<ConstantScheduler>) -> Result<Self> {
        if schedulers.len() != boundaries.len() + 1 {
            return Err(TrainingError::Schedule(format!(
                "piecewise scheduler needs {} distributions for {} boundaries, got {}",
                boundaries.len() + 1,
                boundaries.len(),
                schedulers.len()
            )));
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TrainingError::Schedule(
                "piecewise boundaries must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            boundaries,
            schedulers,
        })
    }

    fn scheduler_for(&self, global_step: u64) -> &ConstantScheduler {
        let idx = self
            .boundaries
            .iter()
            .position(|b| global_step < *b)
            .unwrap_or(self.boundaries.len());
        &self.schedulers[idx]
    }
}

impl TaskScheduler for PiecewiseScheduler {
    fn sample(&self, global_step: u64) -> String {
        self.scheduler_for(global_step).sample(global_step)
    }

    fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for scheduler in &self.schedulers {
            for task in scheduler.task_names() {
                if !names.contains(&task) {
                    names.push(task);
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn constant(weights: &[(&str, f64)], seed: u64) -> ConstantScheduler {
        ConstantScheduler::new(
            weights
                .iter()
                .map(|(t, w)| (t.to_string(), *w))
                .collect(),
            seed,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_weights() {
        assert!(ConstantScheduler::new(vec![], 0).is_err());
        assert!(ConstantScheduler::new(vec![("a".to_string(), 0.0)], 0).is_err());
        assert!(ConstantScheduler::new(vec![("a".to_string(), -1.0)], 0).is_err());
    }

    #[test]
    fn test_sampling_is_deterministic_per_step() {
        let scheduler = constant(&[("a", 1.0), ("b", 1.0)], 7);
        for step in 0..50 {
            assert_eq!(scheduler.sample(step), scheduler.sample(step));
        }
        // An identically configured scheduler redraws the same sequence.
        let replay = constant(&[("a", 1.0), ("b", 1.0)], 7);
        let drawn: Vec<String> = (0..50).map(|s| scheduler.sample(s)).collect();
        let redrawn: Vec<String> = (0..50).map(|s| replay.sample(s)).collect();
        assert_eq!(drawn, redrawn);
    }

    #[test]
    fn test_sampling_tracks_weights() {
        let scheduler = constant(&[("heavy", 9.0), ("light", 1.0)], 3);
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for step in 0..2000 {
            *counts.entry(scheduler.sample(step)).or_default() += 1;
        }
        let heavy = counts["heavy"] as f64 / 2000.0;
        assert!(heavy > 0.85 && heavy < 0.95, "heavy fraction {heavy}");
    }

    #[test]
    fn test_single_task_always_sampled() {
        let scheduler = constant(&[("only", 2.5)], 0);
        for step in 0..10 {
            assert_eq!(scheduler.sample(step), "only");
        }
    }

    #[test]
    fn test_piecewise_switches_at_boundaries() {
        let early = constant(&[("warmup", 1.0)], 1);
        let late = constant(&[("main", 1.0)], 1);
        let scheduler = PiecewiseScheduler::new(vec![100], vec![early, late]).unwrap();

        assert_eq!(scheduler.sample(0), "warmup");
        assert_eq!(scheduler.sample(99), "warmup");
        assert_eq!(scheduler.sample(100), "main");
        assert_eq!(scheduler.sample(5000), "main");
        assert_eq!(
            scheduler.task_names(),
            vec!["warmup".to_string(), "main".to_string()]
        );
    }

    #[test]
    fn test_piecewise_validates_shape() {
        let only = constant(&[("a", 1.0)], 0);
        assert!(PiecewiseScheduler::new(vec![10], vec![only.clone()]).is_err());
        assert!(
            PiecewiseScheduler::new(vec![10, 10], vec![only.clone(), only.clone(), only])
                .is_err()
        );
    }
}
