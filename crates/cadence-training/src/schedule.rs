//! Program schedules.
//!
//! A schedule binds one task to the ordered list of programs that run
//! whenever the task is selected: typically a train program followed by
//! eval programs over the task's datasets.

use crate::error::Result;
use crate::program::{Program, ProgramOutput};
use crate::session::Session;

/// Ordered programs for one task.
pub struct ProgramSchedule {
    task_name: String,
    dataset_names: Vec<String>,
    programs: Vec<Box<dyn Program>>,
}

impl ProgramSchedule {
    /// Creates an empty schedule for a task.
    pub fn new(task_name: impl Into<String>, dataset_names: Vec<String>) -> Self {
        Self {
            task_name: task_name.into(),
            dataset_names,
            programs: Vec::new(),
        }
    }

    /// Appends a program; programs run in insertion order.
    pub fn add_program(mut self, program: Box<dyn Program>) -> Self {
        self.programs.push(program);
        self
    }

    /// The task this schedule serves.
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Dataset splits the schedule's eval/decode programs cover.
    pub fn dataset_names(&self) -> &[String] {
        &self.dataset_names
    }

    /// Number of programs in the schedule.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Whether the schedule has no programs.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Mutable access to the programs, for the executor's build and
    /// restore phases.
    pub fn programs_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Program>> {
        self.programs.iter_mut()
    }

    /// Runs every program in order, stopping at the first error.
    pub fn run(&mut self, session: &mut Session) -> Result<Vec<ProgramOutput>> {
        tracing::debug!(
            task = %self.task_name,
            programs = self.programs.len(),
            global_step = session.global_step(),
            "Running schedule"
        );
        let mut outputs = Vec::with_capacity(self.programs.len());
        for program in &mut self.programs {
            outputs.push(program.run(session)?);
        }
        Ok(outputs)
    }
}
