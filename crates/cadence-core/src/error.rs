//! Error types for the cadence core library.
//!
//! Configuration errors are always surfaced synchronously to the caller;
//! nothing here is silently ignored.

use thiserror::Error;

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: [{}])", suggestions.join(","))
    }
}

/// The error type for configuration-tree operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter name does not match `^[a-z][a-z0-9_]*$`.
    #[error("invalid parameter name: {name}")]
    InvalidName {
        /// The offending name.
        name: String,
    },

    /// A parameter with this name is already defined on the node.
    #[error("parameter {name} is already defined")]
    DuplicateName {
        /// The duplicate name.
        name: String,
    },

    /// A parameter name (or dotted path) did not resolve.
    ///
    /// For a terminal-name miss, `suggestions` carries the lexically
    /// nearest defined names on the node.
    #[error("{}{}", .name, format_suggestions(.suggestions))]
    UndefinedName {
        /// The unresolved name or dotted path.
        name: String,
        /// Near-miss candidates, possibly empty.
        suggestions: Vec<String>,
    },

    /// A mutation was attempted on a frozen node.
    #[error("params is frozen: cannot modify {name}")]
    Frozen {
        /// The name whose mutation was rejected.
        name: String,
    },

    /// A dotted path tried to descend through a value that is not a
    /// nested params node.
    #[error("cannot introspect {segment} for {path}")]
    CannotIntrospect {
        /// The path segment that is not traversable.
        segment: String,
        /// The full requested path.
        path: String,
    },

    /// A `seg[i]` path segment carried a malformed or out-of-range index.
    #[error("invalid list index in {segment}")]
    InvalidListIndex {
        /// The offending segment.
        segment: String,
    },

    /// A parameter holds a different type than the caller asked for.
    #[error("parameter {key} is not a {expected}")]
    WrongType {
        /// The dotted key.
        key: String,
        /// The requested type.
        expected: &'static str,
    },

    /// A textual value cannot be parsed back unambiguously because the
    /// target's previous type gives no guidance and no type override was
    /// supplied.
    #[error("ambiguous type for {key}: previous value gives no type and no override was supplied")]
    AmbiguousType {
        /// The dotted key.
        key: String,
    },

    /// Malformed serialized text.
    #[error("parse error: {message}")]
    Parse {
        /// What went wrong.
        message: String,
    },

    /// A value cannot be structurally serialized.
    #[error("serialization error: {message}")]
    Serialization {
        /// What went wrong.
        message: String,
    },
}

/// A specialized Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
