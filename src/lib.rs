//! Chauffeur - Parameter Sweep Driver
//!
//! Expands a declarative sweep description into a set of tasks, one per
//! point of the cartesian product of a run's variables, materialises a
//! working directory for each task with parameters substituted into its
//! files, and runs pre/exec/post commands there, serially or on a pool of
//! worker threads.
//!
//! # Architecture
//!
//! - [`config`]: Typed configuration and its YAML loader
//! - [`params`]: Scoped parameter store with `%(name:spec)` substitution
//! - [`expression`]: Allow-listed backtick expressions and their dependency order
//! - [`tasks`]: Lazy cartesian-product task generation
//! - [`render`]: Template directory and file rendering
//! - [`execution`]: Per-task state machine, scheduler and run report
//! - [`monitoring`]: Execution timeline
//!
//! # Example
//!
//! ```rust,no_run
//! use chauffeur::{load_config, Engine, StaticContext};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("input.yaml")?;
//!
//!     let engine = Engine::new(config, StaticContext::detect()?);
//!     let report = engine.run()?;
//!
//!     println!("{} of {} tasks failed", report.counts().failed, report.tasks.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod expression;
pub mod monitoring;
pub mod params;
pub mod render;
pub mod tasks;

// Re-export commonly used types
pub use config::{load_config, Config, ParamValue, RunSpec, Scalar};
pub use error::{Error, Result};
pub use execution::{Engine, RunReport, TaskStatus};
pub use params::{ParameterStore, StaticContext};
pub use tasks::{Task, TaskGenerator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Chauffeur";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "Chauffeur");
    }

    #[test]
    fn test_module_exports_generator() {
        let run = RunSpec::new("run").with_variable("x", vec![Scalar::Int(1), Scalar::Int(2)]);
        let tasks: Vec<Task> = TaskGenerator::new(&run).unwrap().collect();
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
