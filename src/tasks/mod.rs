//! Task Module
//!
//! Expansion of run specifications into concrete tasks.
//!
//! - [`model`]: The [`Task`] produced for each point of the parameter space
//! - [`generator`]: Lazy cartesian-product enumeration

pub mod generator;
pub mod model;

pub use generator::{resolve_variable_order, TaskGenerator};
pub use model::Task;
