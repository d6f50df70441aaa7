//! Run Report
//!
//! Per-task outcome of a sweep, saved as pretty JSON to
//! `<report-dir>/<config-stem>.report.json` when the run finishes so the
//! result can be inspected or compared later.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use super::Phase;
use crate::config::value::Scalar;
use crate::error::{Error, Result};

/// Default directory reports are written to.
pub const DEFAULT_REPORT_DIR: &str = ".chauffeur";

/// Terminal state of one task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum TaskStatus {
    /// The task directory already existed
    Skipped,
    /// Dry run; nothing was touched
    Planned,
    Done,
    Failed { phase: Phase, cause: String },
}

impl TaskStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Planned => write!(f, "PLANNED"),
            Self::Done => write!(f, "DONE"),
            Self::Failed { phase, cause } => write!(f, "FAILED in {}: {}", phase, cause),
        }
    }
}

/// What happened to a single task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub run: String,
    pub index: usize,
    pub assignment: BTreeMap<String, Scalar>,
    pub taskdir: PathBuf,
    /// Name of the worker thread that ran the task
    pub thread: String,
    /// Phases that ran to completion
    pub phases: Vec<Phase>,
    #[serde(flatten)]
    pub status: TaskStatus,
    pub duration_ms: u64,
}

impl TaskRecord {
    pub fn label(&self) -> String {
        format!("{}#{}", self.run, self.index)
    }
}

/// Number of tasks per terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub skipped: usize,
    pub planned: usize,
    pub done: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.skipped + self.planned + self.done + self.failed
    }
}

/// Outcome of a whole sweep.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Configuration file the sweep was driven by
    pub config_path: String,
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    /// Set when submission stopped early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped: Option<String>,
    pub tasks: Vec<TaskRecord>,
}

impl RunReport {
    pub fn new(config_path: impl Into<String>) -> Self {
        Self {
            config_path: config_path.into(),
            started: Utc::now(),
            finished: None,
            stopped: None,
            tasks: Vec::new(),
        }
    }

    pub fn push(&mut self, record: TaskRecord) {
        self.tasks.push(record);
    }

    /// Stamps the finish time and puts tasks back into enumeration order.
    pub fn finish(&mut self) {
        self.tasks
            .sort_by(|a, b| a.run.cmp(&b.run).then(a.index.cmp(&b.index)));
        self.finished = Some(Utc::now());
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for task in &self.tasks {
            match task.status {
                TaskStatus::Skipped => counts.skipped += 1,
                TaskStatus::Planned => counts.planned += 1,
                TaskStatus::Done => counts.done += 1,
                TaskStatus::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.iter().filter(|t| t.status.is_failure())
    }

    /// True when no task failed and submission was not stopped.
    pub fn is_success(&self) -> bool {
        self.stopped.is_none() && self.failures().next().is_none()
    }

    /// Report file for a configuration path inside `dir`.
    pub fn path_for(dir: &Path, config_path: &str) -> PathBuf {
        let stem = Path::new(config_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("input");
        dir.join(format!("{}.report.json", stem))
    }

    /// Writes the report into `dir` and returns the file written.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let path = Self::path_for(dir, &self.config_path);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| Error::io(&path, e))?;

        info!("Saved run report to {}", path.display());
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(run: &str, index: usize, status: TaskStatus) -> TaskRecord {
        TaskRecord {
            run: run.to_string(),
            index,
            assignment: BTreeMap::from([
                ("num".to_string(), Scalar::Int(index as i64)),
                ("dt".to_string(), Scalar::Float(0.5)),
            ]),
            taskdir: PathBuf::from(format!("/work/{}_{}", run, index)),
            thread: "01".to_string(),
            phases: vec![Phase::Setup, Phase::Exec],
            status,
            duration_ms: 12,
        }
    }

    #[test]
    fn test_counts_and_success() {
        let mut report = RunReport::new("input.yaml");
        report.push(record("run_a", 0, TaskStatus::Done));
        report.push(record("run_a", 1, TaskStatus::Skipped));
        assert!(report.is_success());

        report.push(record(
            "run_a",
            2,
            TaskStatus::Failed {
                phase: Phase::Exec,
                cause: "exit code 1".to_string(),
            },
        ));
        let counts = report.counts();
        assert_eq!(counts.done, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total(), 3);
        assert!(!report.is_success());
        assert_eq!(report.failures().next().unwrap().label(), "run_a#2");
    }

    #[test]
    fn test_stopped_is_not_success() {
        let mut report = RunReport::new("input.yaml");
        report.stopped = Some("stopped after failure".to_string());
        assert!(!report.is_success());
    }

    #[test]
    fn test_finish_sorts_tasks() {
        let mut report = RunReport::new("input.yaml");
        report.push(record("run_b", 0, TaskStatus::Done));
        report.push(record("run_a", 1, TaskStatus::Done));
        report.push(record("run_a", 0, TaskStatus::Done));
        report.finish();

        let labels: Vec<String> = report.tasks.iter().map(TaskRecord::label).collect();
        assert_eq!(labels, vec!["run_a#0", "run_a#1", "run_b#0"]);
        assert!(report.finished.is_some());
    }

    #[test]
    fn test_status_display() {
        let failed = TaskStatus::Failed {
            phase: Phase::Pre,
            cause: "boom".to_string(),
        };
        assert_eq!(failed.to_string(), "FAILED in pre: boom");
        assert_eq!(TaskStatus::Planned.to_string(), "PLANNED");
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let mut report = RunReport::new("configs/sweep.yaml");
        report.push(record("run_a", 0, TaskStatus::Done));
        report.push(record(
            "run_a",
            1,
            TaskStatus::Failed {
                phase: Phase::Post,
                cause: "exit code 2".to_string(),
            },
        ));
        report.finish();

        let path = report.save(temp.path()).unwrap();
        assert_eq!(path, temp.path().join("sweep.report.json"));

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"status\": \"FAILED\""));
        assert!(json.contains("\"phase\": \"post\""));

        let loaded = RunReport::load(&path).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_load_missing() {
        let result = RunReport::load(Path::new("/nonexistent/report.json"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
