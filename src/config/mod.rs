//! Sweep Configuration Module
//!
//! Typed configuration consumed by the engine, and the loader that
//! produces it from a YAML document.
//!
//! # Structure
//!
//! - [`value`]: Tagged scalar / parameter values
//! - [`model`]: Driver options, run specifications and file directives
//! - [`parser`]: YAML loading and section sniffing
//! - [`validator`]: Shape checks run before any task is generated

pub mod model;
pub mod parser;
pub mod validator;
pub mod value;

pub use model::{Config, DriverOptions, ExecutionMode, FileDirective, FileKind, RunSpec};
pub use parser::{load_config, parse_config};
pub use validator::validate_config;
pub use value::{ParamValue, Scalar};
