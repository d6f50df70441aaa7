//! Parameter Module
//!
//! Everything needed to turn named bindings into concrete text:
//!
//! - [`context`]: Immutable process context (`cwd`, `scriptdir`) and path helpers
//! - [`format`]: printf-style specs for `%(name:spec)` placeholders
//! - [`store`]: The scoped [`ParameterStore`] with recursive resolution

pub mod context;
pub mod format;
pub mod store;

pub use context::{absolute_from, StaticContext};
pub use format::{format_scalar, DefaultFormats};
pub use store::{find_placeholders, referenced_names, ParameterStore, Placeholder, ScopeKind};
