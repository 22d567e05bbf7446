//! The multi-schedule training executor.
//!
//! The executor owns every task's [`ProgramSchedule`] plus a single
//! save-only checkpoint directory. Its run loop is a small state machine:
//! initialize the device (with retries), restore, then repeatedly select a
//! schedule, run it, and checkpoint, until the global step reaches
//! `max_steps`. A final checkpoint is written before stopping so a
//! follow-up job always finds the terminal state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use cadence_checkpoint::{CheckpointConfig, CheckpointManager, JsonCheckpointer};

use crate::error::{Result, TrainingError};
use crate::retry::RetryPolicy;
use crate::schedule::ProgramSchedule;
use crate::session::Session;
use crate::task_scheduler::TaskScheduler;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Directory for checkpoints and the manifest.
    pub checkpoint_dir: PathBuf,
    /// Stop once the global step reaches this value.
    pub max_steps: u64,
    /// Recent checkpoints kept by rotation.
    pub max_to_keep: usize,
    /// Optional time-based retention interval.
    pub keep_every_n_secs: Option<u64>,
    /// Retry policy for device initialization.
    pub retry: RetryPolicy,
}

impl ExecutorConfig {
    /// Creates a configuration with default retention and retry policies.
    pub fn new(checkpoint_dir: impl Into<PathBuf>, max_steps: u64) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            max_steps,
            max_to_keep: 5,
            keep_every_n_secs: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the rotation window size.
    pub fn with_max_to_keep(mut self, max_to_keep: usize) -> Self {
        self.max_to_keep = max_to_keep;
        self
    }

    /// Preserves one checkpoint per interval past the rotation window.
    pub fn with_keep_every_n_secs(mut self, secs: u64) -> Self {
        self.keep_every_n_secs = Some(secs);
        self
    }

    /// Sets the retry policy for device initialization.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Drives program schedules for one or more tasks until the global step
/// reaches its budget.
pub struct Executor {
    config: ExecutorConfig,
    schedules: BTreeMap<String, ProgramSchedule>,
    task_scheduler: Option<Box<dyn TaskScheduler>>,
    checkpoints: CheckpointManager<JsonCheckpointer>,
    /// How many times each task was selected, for the stop-time summary.
    selection_counts: BTreeMap<String, u64>,
}

impl Executor {
    /// Creates an executor and builds every program's subgraph.
    ///
    /// Building everything up front means a configuration that cannot run
    /// fails here, before any state is touched. With multiple schedules a
    /// task scheduler is required, and every task it can emit must have a
    /// schedule.
    pub fn new(
        config: ExecutorConfig,
        schedules: Vec<ProgramSchedule>,
        task_scheduler: Option<Box<dyn TaskScheduler>>,
        session: &mut Session,
    ) -> Result<Self> {
        if schedules.is_empty() {
            return Err(TrainingError::Schedule(
                "executor needs at least one schedule".to_string(),
            ));
        }

        let mut by_task = BTreeMap::new();
        for schedule in schedules {
            let task = schedule.task_name().to_string();
            if by_task.insert(task.clone(), schedule).is_some() {
                return Err(TrainingError::Schedule(format!(
                    "duplicate schedule for task {task}"
                )));
            }
        }

        match &task_scheduler {
            None if by_task.len() > 1 => {
                return Err(TrainingError::Schedule(
                    "multiple schedules require a task scheduler".to_string(),
                ));
            }
            Some(scheduler) => {
                for task in scheduler.task_names() {
                    if !by_task.contains_key(&task) {
                        return Err(TrainingError::UnknownTask { task });
                    }
                }
            }
            None => {}
        }

        let mut executor = Self {
            checkpoints: CheckpointManager::new(
                CheckpointConfig {
                    checkpoint_dir: config.checkpoint_dir.clone(),
                    max_to_keep: config.max_to_keep,
                    keep_every_n_secs: config.keep_every_n_secs,
                },
                JsonCheckpointer::new(),
            ),
            config,
            schedules: by_task,
            task_scheduler,
            selection_counts: BTreeMap::new(),
        };
        executor.checkpoints.initialize()?;

        // Build every subgraph now; a partially buildable executor is not
        // usable at all.
        for schedule in executor.schedules.values_mut() {
            for program in schedule.programs_mut() {
                program.build_subgraph(session)?;
            }
        }

        Ok(executor)
    }

    /// The checkpoint manager, mainly for inspection in tests and tools.
    pub fn checkpoints(&self) -> &CheckpointManager<JsonCheckpointer> {
        &self.checkpoints
    }

    /// How often each task was selected so far.
    pub fn selection_counts(&self) -> &BTreeMap<String, u64> {
        &self.selection_counts
    }

    /// Runs until the session's global step reaches `max_steps`.
    pub fn run(&mut self, session: &mut Session) -> Result<()> {
        // Wait for the device with retries; a transiently slow resource
        // must not kill the run.
        self.config
            .retry
            .run("device initialization", || session.device_mut().initialize())?;

        for schedule in self.schedules.values_mut() {
            for program in schedule.programs_mut() {
                program.restore_if_needed(session, &self.checkpoints)?;
            }
        }

        tracing::info!(
            device = session.device().name(),
            tasks = self.schedules.len(),
            start_step = session.global_step(),
            max_steps = self.config.max_steps,
            "Executor starting"
        );

        let mut last_saved_step = None;
        loop {
            let step = session.global_step();
            if step >= self.config.max_steps {
                if last_saved_step != Some(step) {
                    self.checkpoints.save(&session.snapshot())?;
                }
                tracing::info!(
                    global_step = step,
                    selections = ?self.selection_counts,
                    "Executor stopped"
                );
                return Ok(());
            }

            let task = self.select_task(step)?;
            *self.selection_counts.entry(task.clone()).or_default() += 1;
            tracing::info!(task = %task, global_step = step, "Selected schedule");

            let schedule = self
                .schedules
                .get_mut(&task)
                .ok_or_else(|| TrainingError::UnknownTask { task: task.clone() })?;
            schedule.run(session)?;

            // Save after every schedule run, no step-interval gating: the
            // executor is the sole writer of this directory.
            self.checkpoints.save(&session.snapshot())?;
            last_saved_step = Some(session.global_step());
        }
    }

    fn select_task(&self, global_step: u64) -> Result<String> {
        match &self.task_scheduler {
            Some(scheduler) => Ok(scheduler.sample(global_step)),
            None => self
                .schedules
                .keys()
                .next()
                .cloned()
                .ok_or_else(|| TrainingError::Schedule("no schedules registered".to_string())),
        }
    }
}
