//! Template Rendering Module
//!
//! Copies template directories into task directories and renders file
//! directives with a task's parameters.

pub mod template;

pub use template::{RenderSummary, Renderer};
