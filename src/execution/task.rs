//! Single Task Execution
//!
//! Drives one prepared task through its state machine:
//! - skip when `skipifexist` is set and the task directory already exists
//! - SETUP renders the template directory and the file directives
//! - PRE, EXEC and POST run their commands through the shell inside the
//!   task directory
//!
//! The first failing phase ends the task; sibling tasks are unaffected.

use std::fs;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::time::Instant;

use log::{debug, error, info};

use super::context::PreparedTask;
use super::report::{TaskRecord, TaskStatus};
use super::Phase;
use crate::config::model::{Config, ExecutionMode};
use crate::error::{Error, Result};
use crate::render::Renderer;

/// Shell used for phase commands.
const SHELL: &str = "sh";

/// Runs prepared tasks according to the driver options.
#[derive(Debug, Clone, Copy)]
pub struct TaskRunner<'a> {
    config: &'a Config,
    renderer: &'a Renderer,
}

impl<'a> TaskRunner<'a> {
    pub fn new(config: &'a Config, renderer: &'a Renderer) -> Self {
        Self { config, renderer }
    }

    /// Runs the task to a terminal state and records the outcome.
    pub fn run(&self, prepared: &PreparedTask) -> TaskRecord {
        let started = Instant::now();
        let mut phases = Vec::new();
        let status = self.drive(prepared, &mut phases);

        match &status {
            TaskStatus::Failed { phase, cause } => {
                error!("{}: {} phase failed: {}", prepared.task.label(), phase, cause)
            }
            status => info!("{}: {}", prepared.task, status),
        }

        TaskRecord {
            run: prepared.task.run.clone(),
            index: prepared.task.index,
            assignment: prepared.task.assignment.clone(),
            taskdir: prepared.taskdir.clone(),
            thread: prepared.thread.clone(),
            phases,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn drive(&self, prepared: &PreparedTask, phases: &mut Vec<Phase>) -> TaskStatus {
        let driver = &self.config.driver;
        let label = prepared.task.label();

        if driver.skipifexist && driver.taskdir.is_some() && prepared.taskdir.exists() {
            info!(
                "{}: {} already exists, skipping",
                label,
                prepared.taskdir.display()
            );
            return TaskStatus::Skipped;
        }

        if driver.dryrun {
            self.describe(prepared);
            return TaskStatus::Planned;
        }

        if let Err(e) = self.setup(prepared) {
            return TaskStatus::Failed {
                phase: Phase::Setup,
                cause: e.to_string(),
            };
        }
        phases.push(Phase::Setup);

        if driver.mode == ExecutionMode::Setup {
            return TaskStatus::Done;
        }

        for (phase, command) in &prepared.commands {
            debug!("{}: {} `{}`", label, phase, command);
            if let Err(e) = run_command(*phase, command, &prepared.taskdir) {
                return TaskStatus::Failed {
                    phase: *phase,
                    cause: e.to_string(),
                };
            }
            phases.push(*phase);
        }

        TaskStatus::Done
    }

    fn setup(&self, prepared: &PreparedTask) -> Result<()> {
        let taskdir = &prepared.taskdir;

        match &prepared.templatedir {
            Some(template) => {
                let summary = self
                    .renderer
                    .render_tree(template, taskdir, &prepared.store)?;
                debug!(
                    "{}: {} files rendered, {} copied",
                    prepared.task.label(),
                    summary.rendered,
                    summary.copied
                );
            }
            None => fs::create_dir_all(taskdir).map_err(|e| Error::io(taskdir, e))?,
        }

        for file in self.config.task_files() {
            self.renderer.render_file(file, &prepared.store, taskdir)?;
        }

        Ok(())
    }

    fn describe(&self, prepared: &PreparedTask) {
        let label = prepared.task.label();
        info!("[DRY RUN] {}", prepared.task);
        info!("[DRY RUN] {}: taskdir {}", label, prepared.taskdir.display());
        if let Some(template) = &prepared.templatedir {
            info!("[DRY RUN] {}: copy template {}", label, template.display());
        }
        for file in self.config.task_files() {
            info!("[DRY RUN] {}: render {} ({})", label, file.name, file.input);
        }
        if self.config.driver.mode == ExecutionMode::Exec {
            for (phase, command) in &prepared.commands {
                info!("[DRY RUN] {}: {} `{}`", label, phase, command);
            }
        }
    }
}

/// Runs `command` through the shell in `dir`.
///
/// Standard output is logged at debug level and standard error at error
/// level; a non-zero exit becomes [`Error::CommandFailure`].
pub fn run_command(phase: Phase, command: &str, dir: &Path) -> Result<()> {
    let output = Command::new(SHELL)
        .arg("-c")
        .arg(command)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::io(dir, e))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        debug!("{} output:\n{}", phase, stdout.trim_end());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        error!("{} stderr:\n{}", phase, stderr.trim_end());
    }

    if output.status.success() {
        Ok(())
    } else {
        Err(Error::CommandFailure {
            phase,
            command: command.to_string(),
            dir: dir.to_path_buf(),
            status: describe_status(output.status),
        })
    }
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}
