//! Monitoring Module
//!
//! Timing of the tasks of a sweep.
//!
//! - [`ExecutionTimeline`]: Task start/end timing for Gantt charts

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
