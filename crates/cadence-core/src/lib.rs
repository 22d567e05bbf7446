//! Core configuration types for Cadence.
//!
//! This crate provides the dynamic configuration trees used throughout the
//! Cadence training system. It includes:
//!
//! - **Configuration trees**: [`Params`] nodes with defined-key discipline,
//!   dotted-path access, list indexing, deep copy, and freeze semantics.
//! - **Values**: the [`Value`] taxonomy a node can hold, including nested
//!   nodes, type references, proto-style payloads, and opaque handles.
//! - **Text serialization**: deterministic flat text with an optional type
//!   trailer, plus a structured diff between trees.
//! - **Structured serialization**: a typed, serde-backed form that
//!   round-trips without a template.
//! - **Error types**: structured error handling with near-miss suggestions.
//!
//! # Example
//!
//! ```
//! use cadence_core::Params;
//!
//! let mut p = Params::new();
//! p.define("learning_rate", 0.1, "Optimizer learning rate.").unwrap();
//! p.define("activation", "RELU", "Activation function.").unwrap();
//!
//! // Only defined keys can be assigned; typos are errors.
//! p.set("learning_rate", 0.05).unwrap();
//! assert!(p.set("learning_rte", 0.05).is_err());
//!
//! let snapshot = p.copy();
//! p.freeze();
//! assert!(p.set("activation", "TANH").is_err());
//! assert_eq!(snapshot.to_text(), p.to_text());
//! ```
//!
//! # Modules
//!
//! - [`hyperparams`]: the [`Params`] tree itself.
//! - [`value`]: the value taxonomy.
//! - [`text`]: flat text serialization and diffing.
//! - [`proto`]: structured serialization.
//! - [`error`]: error types for the library.

pub mod error;
pub mod hyperparams;
pub mod proto;
pub mod text;
pub mod value;

// Re-export commonly used types at the crate root for convenience
pub use error::{ConfigError, Result};
pub use hyperparams::Params;
pub use proto::{ParamsProto, ValueProto};
pub use value::{OpaqueValue, ProtoValue, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_reexports() {
        let mut p = Params::new();
        p.define("depth", 4_i64, "Number of layers.").unwrap();
        p.define("label", Value::None, "Optional label.").unwrap();
        assert_eq!(p.get_i64("depth").unwrap(), 4);

        let _err: Result<()> = Ok(());
        let _proto: ParamsProto = p.to_proto().unwrap();
    }

    #[test]
    fn test_template_workflow() {
        // A frozen template node is copied and specialized per task.
        let mut template = Params::new();
        template.define("task_name", "", "Task identifier.").unwrap();
        let mut optimizer = Params::new();
        optimizer
            .define("learning_rate", 0.1, "Learning rate.")
            .unwrap();
        optimizer.define("momentum", 0.9, "Momentum.").unwrap();
        template
            .define("optimizer", optimizer, "Optimizer settings.")
            .unwrap();
        template.freeze();

        let mut task = template.copy();
        assert!(task.is_frozen());
        assert!(task.set("task_name", "mnist").is_err());

        // Thawing happens by rebuilding through the structured form.
        let mut task = Params::from_proto(&template.to_proto().unwrap()).unwrap();
        task.set("task_name", "mnist").unwrap();
        task.set("optimizer.learning_rate", 0.01).unwrap();
        assert_eq!(task.get_f64("optimizer.learning_rate").unwrap(), 0.01);
        assert_ne!(task.text_diff(&template), "");
    }
}
