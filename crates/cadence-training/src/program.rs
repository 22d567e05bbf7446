//! Training, evaluation, and decode programs.
//!
//! A program owns one prepared computation (a [`StepFn`] produced by a
//! [`SubgraphBuilder`]) and knows how to drive it: a train program advances
//! the global step, an eval program measures without advancing, a decode
//! program counts emitted outputs. Programs are configured from [`Params`]
//! trees so the whole run is describable as one configuration.

use std::fmt;
use std::sync::Arc;

use cadence_checkpoint::{CheckpointManager, JsonCheckpointer};
use cadence_core::Params;

use crate::error::{Result, TrainingError};
use crate::session::Session;

/// One runnable step of a prepared subgraph.
pub trait StepFn: Send {
    /// Executes a single step, returning its scalar result (a loss for
    /// training, a metric for eval, an emitted-output count for decode).
    fn step(&mut self, session: &mut Session) -> Result<f64>;
}

/// Builds a task's subgraph into a runnable [`StepFn`].
///
/// This is the seam where a real compute backend plugs in; the executor
/// never looks past it.
pub trait SubgraphBuilder: Send + Sync {
    fn build(&self, task_params: &Params, session: &mut Session) -> Result<Box<dyn StepFn>>;
}

/// A step function that returns a constant (for wiring tests).
pub struct ConstantStepFn {
    value: f64,
}

impl ConstantStepFn {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl StepFn for ConstantStepFn {
    fn step(&mut self, _session: &mut Session) -> Result<f64> {
        Ok(self.value)
    }
}

/// A builder producing [`ConstantStepFn`]s (for wiring tests).
pub struct ConstantBuilder {
    value: f64,
}

impl ConstantBuilder {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl SubgraphBuilder for ConstantBuilder {
    fn build(&self, _task_params: &Params, _session: &mut Session) -> Result<Box<dyn StepFn>> {
        Ok(Box::new(ConstantStepFn::new(self.value)))
    }
}

/// What one program invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramOutput {
    /// Program name (`train`, `eval`, `decode`).
    pub program: String,
    /// Task the program belongs to.
    pub task_name: String,
    /// Steps executed in this invocation.
    pub steps: u64,
    /// Mean loss, mean metric, or total emitted outputs.
    pub value: f64,
}

/// A unit of work the executor schedules.
///
/// Lifecycle: `build_subgraph` once at executor construction,
/// `restore_if_needed` once before the first run, then `run` per schedule
/// invocation.
pub trait Program: Send {
    /// Program name for logs and outputs.
    fn name(&self) -> &str;

    /// Task this program belongs to.
    fn task_name(&self) -> &str;

    /// Prepares the program's computation. Failures are fatal.
    fn build_subgraph(&mut self, session: &mut Session) -> Result<()>;

    /// Restores session state from the newest checkpoint, once. A directory
    /// with no checkpoint leaves the session untouched.
    fn restore_if_needed(
        &mut self,
        session: &mut Session,
        checkpoints: &CheckpointManager<JsonCheckpointer>,
    ) -> Result<()>;

    /// Runs one invocation of the program.
    fn run(&mut self, session: &mut Session) -> Result<ProgramOutput>;
}

/// Default configuration tree for a train program.
pub fn train_program_params() -> Params {
    let mut p = Params::new();
    // Param names are validated; construction cannot fail here.
    let _ = p.define("task_name", "", "Task this program trains.");
    let _ = p.define(
        "steps_per_loop",
        100_i64,
        "Training steps per schedule invocation.",
    );
    p
}

/// Default configuration tree for an eval program.
pub fn eval_program_params() -> Params {
    let mut p = Params::new();
    let _ = p.define("task_name", "", "Task this program evaluates.");
    let _ = p.define("dataset_name", "eval", "Dataset split to evaluate.");
    let _ = p.define("eval_steps", 10_i64, "Evaluation steps per invocation.");
    p
}

/// Default configuration tree for a decode program.
pub fn decode_program_params() -> Params {
    let mut p = Params::new();
    let _ = p.define("task_name", "", "Task this program decodes.");
    let _ = p.define("dataset_name", "decode", "Dataset split to decode.");
    let _ = p.define("decode_steps", 10_i64, "Decode steps per invocation.");
    p
}

fn positive_steps(params: &Params, key: &str, program: &str) -> Result<u64> {
    let steps = params.get_i64(key)?;
    if steps <= 0 {
        return Err(TrainingError::InvalidProgram {
            name: program.to_string(),
            message: format!("{key} must be positive, got {steps}"),
        });
    }
    Ok(steps as u64)
}

fn required_task_name(params: &Params, program: &str) -> Result<String> {
    let task_name = params.get_str("task_name")?.to_string();
    if task_name.is_empty() {
        return Err(TrainingError::InvalidProgram {
            name: program.to_string(),
            message: "task_name must be set".to_string(),
        });
    }
    Ok(task_name)
}

/// Runs training steps, advancing the global step once per step.
pub struct TrainProgram {
    task_name: String,
    steps_per_loop: u64,
    params: Params,
    builder: Arc<dyn SubgraphBuilder>,
    step_fn: Option<Box<dyn StepFn>>,
    restored: bool,
}

impl TrainProgram {
    /// Builds from a [`train_program_params`] tree.
    pub fn from_params(params: &Params, builder: Arc<dyn SubgraphBuilder>) -> Result<Self> {
        Ok(Self {
            task_name: required_task_name(params, "train")?,
            steps_per_loop: positive_steps(params, "steps_per_loop", "train")?,
            params: params.copy(),
            builder,
            step_fn: None,
            restored: false,
        })
    }
}

// The builder and step function are opaque trait objects; show the
// configuration fields only.
impl fmt::Debug for TrainProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainProgram")
            .field("task_name", &self.task_name)
            .field("steps_per_loop", &self.steps_per_loop)
            .finish_non_exhaustive()
    }
}

impl Program for TrainProgram {
    fn name(&self) -> &str {
        "train"
    }

    fn task_name(&self) -> &str {
        &self.task_name
    }

    fn build_subgraph(&mut self, session: &mut Session) -> Result<()> {
        tracing::info!(task = %self.task_name, program = "train", "Building subgraph");
        self.step_fn = Some(self.builder.build(&self.params, session)?);
        Ok(())
    }

    fn restore_if_needed(
        &mut self,
        session: &mut Session,
        checkpoints: &CheckpointManager<JsonCheckpointer>,
    ) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        if let Some(state) = checkpoints.try_restore_latest()? {
            session.restore(&state);
        }
        self.restored = true;
        Ok(())
    }

    fn run(&mut self, session: &mut Session) -> Result<ProgramOutput> {
        let step_fn = self.step_fn.as_mut().ok_or_else(|| TrainingError::Build {
            program: "train".to_string(),
            message: "subgraph was never built".to_string(),
        })?;

        let mut total_loss = 0.0;
        for _ in 0..self.steps_per_loop {
            total_loss += step_fn.step(session)?;
            session.advance_step(1);
        }
        let mean_loss = total_loss / self.steps_per_loop as f64;

        tracing::info!(
            task = %self.task_name,
            steps = self.steps_per_loop,
            global_step = session.global_step(),
            mean_loss,
            "Train loop finished"
        );

        Ok(ProgramOutput {
            program: "train".to_string(),
            task_name: self.task_name.clone(),
            steps: self.steps_per_loop,
            value: mean_loss,
        })
    }
}

/// Runs evaluation steps against one dataset without advancing the global
/// step.
pub struct EvalProgram {
    task_name: String,
    dataset_name: String,
    eval_steps: u64,
    params: Params,
    builder: Arc<dyn SubgraphBuilder>,
    step_fn: Option<Box<dyn StepFn>>,
    restored: bool,
}

impl EvalProgram {
    /// Builds from an [`eval_program_params`] tree.
    pub fn from_params(params: &Params, builder: Arc<dyn SubgraphBuilder>) -> Result<Self> {
        Ok(Self {
            task_name: required_task_name(params, "eval")?,
            dataset_name: params.get_str("dataset_name")?.to_string(),
            eval_steps: positive_steps(params, "eval_steps", "eval")?,
            params: params.copy(),
            builder,
            step_fn: None,
            restored: false,
        })
    }

    /// Dataset split this program evaluates.
    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }
}

impl fmt::Debug for EvalProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalProgram")
            .field("task_name", &self.task_name)
            .field("dataset_name", &self.dataset_name)
            .field("eval_steps", &self.eval_steps)
            .finish_non_exhaustive()
    }
}

impl Program for EvalProgram {
    fn name(&self) -> &str {
        "eval"
    }

    fn task_name(&self) -> &str {
        &self.task_name
    }

    fn build_subgraph(&mut self, session: &mut Session) -> Result<()> {
        tracing::info!(
            task = %self.task_name,
            dataset = %self.dataset_name,
            program = "eval",
            "Building subgraph"
        );
        self.step_fn = Some(self.builder.build(&self.params, session)?);
        Ok(())
    }

    fn restore_if_needed(
        &mut self,
        session: &mut Session,
        checkpoints: &CheckpointManager<JsonCheckpointer>,
    ) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        if let Some(state) = checkpoints.try_restore_latest()? {
            session.restore(&state);
        }
        self.restored = true;
        Ok(())
    }

    fn run(&mut self, session: &mut Session) -> Result<ProgramOutput> {
        let step_fn = self.step_fn.as_mut().ok_or_else(|| TrainingError::Build {
            program: "eval".to_string(),
            message: "subgraph was never built".to_string(),
        })?;

        let step_before = session.global_step();
        let mut total_metric = 0.0;
        for _ in 0..self.eval_steps {
            total_metric += step_fn.step(session)?;
        }
        debug_assert_eq!(session.global_step(), step_before);
        let mean_metric = total_metric / self.eval_steps as f64;

        tracing::info!(
            task = %self.task_name,
            dataset = %self.dataset_name,
            steps = self.eval_steps,
            global_step = step_before,
            mean_metric,
            "Eval finished"
        );

        Ok(ProgramOutput {
            program: "eval".to_string(),
            task_name: self.task_name.clone(),
            steps: self.eval_steps,
            value: mean_metric,
        })
    }
}

/// Runs decode steps, summing the emitted-output counts the step function
/// reports.
pub struct DecodeProgram {
    task_name: String,
    dataset_name: String,
    decode_steps: u64,
    params: Params,
    builder: Arc<dyn SubgraphBuilder>,
    step_fn: Option<Box<dyn StepFn>>,
    restored: bool,
}

impl DecodeProgram {
    /// Builds from a [`decode_program_params`] tree.
    pub fn from_params(params: &Params, builder: Arc<dyn SubgraphBuilder>) -> Result<Self> {
        Ok(Self {
            task_name: required_task_name(params, "decode")?,
            dataset_name: params.get_str("dataset_name")?.to_string(),
            decode_steps: positive_steps(params, "decode_steps", "decode")?,
            params: params.copy(),
            builder,
            step_fn: None,
            restored: false,
        })
    }
}

impl fmt::Debug for DecodeProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeProgram")
            .field("task_name", &self.task_name)
            .field("dataset_name", &self.dataset_name)
            .field("decode_steps", &self.decode_steps)
            .finish_non_exhaustive()
    }
}

impl Program for DecodeProgram {
    fn name(&self) -> &str {
        "decode"
    }

    fn task_name(&self) -> &str {
        &self.task_name
    }

    fn build_subgraph(&mut self, session: &mut Session) -> Result<()> {
        tracing::info!(
            task = %self.task_name,
            dataset = %self.dataset_name,
            program = "decode",
            "Building subgraph"
        );
        self.step_fn = Some(self.builder.build(&self.params, session)?);
        Ok(())
    }

    fn restore_if_needed(
        &mut self,
        session: &mut Session,
        checkpoints: &CheckpointManager<JsonCheckpointer>,
    ) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        if let Some(state) = checkpoints.try_restore_latest()? {
            session.restore(&state);
        }
        self.restored = true;
        Ok(())
    }

    fn run(&mut self, session: &mut Session) -> Result<ProgramOutput> {
        let step_fn = self.step_fn.as_mut().ok_or_else(|| TrainingError::Build {
            program: "decode".to_string(),
            message: "subgraph was never built".to_string(),
        })?;

        let mut emitted = 0.0;
        for _ in 0..self.decode_steps {
            emitted += step_fn.step(session)?;
        }

        tracing::info!(
            task = %self.task_name,
            dataset = %self.dataset_name,
            steps = self.decode_steps,
            emitted,
            "Decode finished"
        );

        Ok(ProgramOutput {
            program: "decode".to_string(),
            task_name: self.task_name.clone(),
            steps: self.decode_steps,
            value: emitted,
        })
    }
}
