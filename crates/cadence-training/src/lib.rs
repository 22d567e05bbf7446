//! Training orchestration for Cadence.
//!
//! This crate drives model training as a sequence of program invocations:
//!
//! - **Programs**: Train, eval, and decode steps built from [`Params`](cadence_core::Params) trees
//! - **Schedules**: Per-task groupings of programs run back to back
//! - **Task scheduling**: Deterministic weighted sampling across tasks
//! - **Executor**: The outer loop that selects schedules, checkpoints, and stops
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        Executor                           │
//! │  ┌───────────────┐  ┌────────────────┐  ┌──────────────┐  │
//! │  │ TaskScheduler │  │ ProgramSchedule│  │ Checkpoints  │  │
//! │  └───────────────┘  └────────────────┘  └──────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//!                             │
//!             ┌───────────────┼───────────────┐
//!             ▼               ▼               ▼
//!        TrainProgram     EvalProgram    DecodeProgram
//! ```
//!
//! Every program runs against a shared [`Session`], which owns the device,
//! the global step, and the named variables that checkpoints capture.
//!
//! # Example
//!
//! ```rust
//! use cadence_training::{
//!     ConstantBuilder, Executor, ExecutorConfig, LocalDevice, ProgramSchedule, Session,
//!     TrainProgram, train_program_params,
//! };
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut session = Session::new(Box::new(LocalDevice::new()));
//!
//! let mut params = train_program_params();
//! params.set("task_name", "mnist").unwrap();
//! params.set("steps_per_loop", 10_i64).unwrap();
//! let train = TrainProgram::from_params(&params, Arc::new(ConstantBuilder::new(0.5))).unwrap();
//! let schedule = ProgramSchedule::new("mnist", vec![]).add_program(Box::new(train));
//!
//! let config = ExecutorConfig::new(dir.path(), 20);
//! let mut executor = Executor::new(config, vec![schedule], None, &mut session).unwrap();
//! executor.run(&mut session).unwrap();
//!
//! assert_eq!(session.global_step(), 20);
//! ```

pub mod error;
pub mod executor;
pub mod program;
pub mod retry;
pub mod schedule;
pub mod session;
pub mod task_scheduler;

// Re-export main types for convenience
pub use error::{InfraError, Result, TrainingError};
pub use executor::{Executor, ExecutorConfig};
pub use program::{
    decode_program_params, eval_program_params, train_program_params, ConstantBuilder,
    ConstantStepFn, DecodeProgram, EvalProgram, Program, ProgramOutput, StepFn, SubgraphBuilder,
    TrainProgram,
};
pub use retry::RetryPolicy;
pub use schedule::ProgramSchedule;
pub use session::{Device, LocalDevice, Session};
pub use task_scheduler::{ConstantScheduler, PiecewiseScheduler, TaskScheduler};

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::Params;
    use std::sync::Arc;
    use tempfile::tempdir;

    // End-to-end: two tasks, weighted selection, eval riding along with
    // train, checkpoint rotation, and a restart that resumes the step.
    #[test]
    fn test_multi_task_training_end_to_end() {
        let dir = tempdir().unwrap();

        fn schedules() -> Vec<ProgramSchedule> {
            let build = |task: &str, loss: f64| {
                let mut train = train_program_params();
                train.set("task_name", task).unwrap();
                train.set("steps_per_loop", 5_i64).unwrap();
                let mut eval = eval_program_params();
                eval.set("task_name", task).unwrap();
                eval.set("eval_steps", 2_i64).unwrap();
                ProgramSchedule::new(task, vec!["eval".to_string()])
                    .add_program(Box::new(
                        TrainProgram::from_params(&train, Arc::new(ConstantBuilder::new(loss)))
                            .unwrap(),
                    ))
                    .add_program(Box::new(
                        EvalProgram::from_params(&eval, Arc::new(ConstantBuilder::new(0.1)))
                            .unwrap(),
                    ))
            };
            vec![build("mnist", 0.5), build("cifar", 0.9)]
        }

        let scheduler = || {
            ConstantScheduler::new(
                vec![("mnist".to_string(), 1.0), ("cifar".to_string(), 1.0)],
                7,
            )
            .unwrap()
        };

        {
            let mut session = Session::new(Box::new(LocalDevice::new()));
            let config = ExecutorConfig::new(dir.path(), 100).with_max_to_keep(3);
            let mut executor = Executor::new(
                config,
                schedules(),
                Some(Box::new(scheduler())),
                &mut session,
            )
            .unwrap();
            executor.run(&mut session).unwrap();
            assert_eq!(session.global_step(), 100);
            assert!(executor.checkpoints().checkpoint_count() <= 3);
        }

        // Restart with a larger budget; the step count carries over.
        let mut session = Session::new(Box::new(LocalDevice::new()));
        let config = ExecutorConfig::new(dir.path(), 150).with_max_to_keep(3);
        let mut executor = Executor::new(
            config,
            schedules(),
            Some(Box::new(scheduler())),
            &mut session,
        )
        .unwrap();
        executor.run(&mut session).unwrap();
        assert_eq!(session.global_step(), 150);
    }

    #[test]
    fn test_program_params_round_trip_through_text() {
        let mut params = train_program_params();
        params.set("task_name", "translate").unwrap();
        params.set("steps_per_loop", 250_i64).unwrap();

        let text = params.to_text();
        let mut rebuilt = train_program_params();
        rebuilt.from_text(&text).unwrap();

        assert_eq!(params, rebuilt);
        assert_eq!(rebuilt.get_str("task_name").unwrap(), "translate");
        assert_eq!(rebuilt.get_i64("steps_per_loop").unwrap(), 250);
    }

    #[test]
    fn test_invalid_program_params_surface_config_errors() {
        let params = Params::new();
        let err = TrainProgram::from_params(&params, Arc::new(ConstantBuilder::new(0.0)))
            .unwrap_err();
        assert!(matches!(err, TrainingError::Config(_)));
    }
}
