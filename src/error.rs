//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! fall into two groups:
//!
//! - configuration-shape errors (unknown parameters, cycles, bad variable
//!   order, malformed expressions) abort the whole sweep before any task
//!   starts
//! - per-task errors (missing templates, failing commands) mark only the
//!   task they occurred in as failed

use std::path::PathBuf;

use thiserror::Error;

use crate::execution::Phase;

/// Errors raised while resolving parameters, rendering templates or
/// executing tasks.
#[derive(Debug, Error)]
pub enum Error {
    /// A name looked up directly is not bound in any scope.
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    /// A `%(name)` placeholder names something no scope defines.
    #[error("Unable to resolve '%({name})' in \"{text}\"")]
    UnresolvedReference { name: String, text: String },

    /// Substitution never reached a fixed point.
    #[error("Cyclic parameter reference: {0}")]
    CyclicReference(String),

    /// A format spec does not fit the value it is applied to.
    #[error("Format '{spec}' cannot be applied to {kind} value '{value}'")]
    MalformedFormat {
        spec: String,
        value: String,
        kind: &'static str,
    },

    /// Syntax or runtime failure inside a backtick expression.
    #[error("Failed to evaluate `{expression}`: {message}")]
    ExpressionError { expression: String, message: String },

    /// Expression-valued parameters depend on each other in a loop.
    #[error("Cyclic expression dependency between: {0}")]
    CyclicExpression(String),

    /// An expression-valued parameter depends on a name that is never defined.
    #[error("Parameter '{parameter}' references undefined parameter '{reference}'")]
    UndefinedReference { parameter: String, reference: String },

    /// `variableorder` does not name exactly the run's variables.
    #[error("Run '{run}': variableorder {order:?} does not match variables {variables:?}")]
    InvalidVariableOrder {
        run: String,
        order: Vec<String>,
        variables: Vec<String>,
    },

    /// A template directory or file does not exist.
    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// A configured command exited unsuccessfully.
    #[error("{phase} command `{command}` failed in {} ({status})", .dir.display())]
    CommandFailure {
        phase: Phase,
        command: String,
        dir: PathBuf,
        status: String,
    },

    /// The configuration document is malformed or inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A filesystem operation failed.
    #[error("I/O error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wraps an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_reference_message() {
        let err = Error::UnresolvedReference {
            name: "num".to_string(),
            text: "run_%(num)".to_string(),
        };
        assert_eq!(err.to_string(), "Unable to resolve '%(num)' in \"run_%(num)\"");
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = Error::io(
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/missing"));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_command_failure_message() {
        let err = Error::CommandFailure {
            phase: Phase::Exec,
            command: "false".to_string(),
            dir: PathBuf::from("/work/run_1"),
            status: "exit code 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("exec command `false` failed"));
        assert!(msg.contains("/work/run_1"));
    }
}
