//! Task Execution Module
//!
//! Runs the tasks of a sweep: every task passes through
//!
//! ```text
//! PENDING → SKIPPED
//!         → SETUP → PRE → EXEC → POST → DONE
//!              ↘      ↘      ↘      ↘
//!                        FAILED
//! ```
//!
//! sequentially or on a fixed-size pool of worker threads.
//!
//! # Architecture
//!
//! - [`context`]: Per-task parameter stores, task directories and commands
//! - [`task`]: The single-task state machine
//! - [`engine`]: Preflight, scheduling and the worker pool
//! - [`report`]: Per-task outcomes and their JSON persistence

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod context;
pub mod engine;
pub mod report;
pub mod task;

pub use context::{PreparedTask, TaskPreparer};
pub use engine::Engine;
pub use report::{RunReport, StatusCounts, TaskRecord, TaskStatus, DEFAULT_REPORT_DIR};
pub use task::TaskRunner;

/// One step of a task's state machine.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Template directory and file directives are rendered
    Setup,
    Pre,
    Exec,
    Post,
}

impl Phase {
    /// Phases driven by a configured shell command, in execution order.
    pub const COMMANDS: [Phase; 3] = [Phase::Pre, Phase::Exec, Phase::Post];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Pre => "pre",
            Self::Exec => "exec",
            Self::Post => "post",
        };
        f.write_str(name)
    }
}
