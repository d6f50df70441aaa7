//! Task Context
//!
//! Builds the private parameter store of each task and resolves everything
//! the state machine needs before the task starts: its parameters, task
//! and template directories, and the substituted phase commands.
//!
//! The store of a task is the chain
//!
//! ```text
//! static → runtime → userdef → run → assignment
//! ```
//!
//! where the runtime scope binds `thread`, `runname`, `taskdir` and
//! `templatedir`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::trace;

use super::Phase;
use crate::config::model::{Config, RunSpec};
use crate::config::value::{ParamValue, Scalar};
use crate::error::{Error, Result};
use crate::expression::resolve_parameters;
use crate::params::{absolute_from, ParameterStore, ScopeKind, StaticContext};
use crate::tasks::Task;

/// Name of the worker thread running the task.
pub const THREAD: &str = "thread";
/// Key of the run section the task belongs to.
pub const RUNNAME: &str = "runname";
/// Absolute task directory.
pub const TASKDIR: &str = "taskdir";
/// Absolute template directory, when one is configured.
pub const TEMPLATEDIR: &str = "templatedir";
/// Number of tasks in the run; bound only while rendering submit scripts.
pub const NTASKS: &str = "ntasks";

/// A task with everything resolved that can be resolved up front.
#[derive(Debug, Clone)]
pub struct PreparedTask {
    pub task: Task,
    pub thread: String,
    pub store: ParameterStore,
    /// Resolved userdef, run and assignment parameters
    pub parameters: BTreeMap<String, Scalar>,
    pub taskdir: PathBuf,
    pub templatedir: Option<PathBuf>,
    /// Substituted command of each configured phase, in execution order
    pub commands: Vec<(Phase, String)>,
}

/// Prepares the tasks of one run.
#[derive(Debug, Clone)]
pub struct TaskPreparer<'a> {
    config: &'a Config,
    run: &'a RunSpec,
    base: ParameterStore,
    cwd: PathBuf,
}

impl<'a> TaskPreparer<'a> {
    pub fn new(config: &'a Config, run: &'a RunSpec, context: &StaticContext) -> Self {
        Self {
            config,
            run,
            base: ParameterStore::new(context),
            cwd: context.cwd().to_path_buf(),
        }
    }

    pub fn run(&self) -> &'a RunSpec {
        self.run
    }

    fn store(
        &self,
        runtime: &BTreeMap<String, ParamValue>,
        assignment: Option<BTreeMap<String, ParamValue>>,
    ) -> ParameterStore {
        let mut store = self
            .base
            .extended(ScopeKind::Runtime, runtime.clone())
            .with_scope(ScopeKind::Userdef, self.config.userdef.clone())
            .with_scope(ScopeKind::Run, self.run.parameters.clone());
        if let Some(assignment) = assignment {
            store.push_scope(ScopeKind::Assignment, assignment);
        }
        store
    }

    fn templatedir(&self, store: &ParameterStore) -> Result<Option<PathBuf>> {
        self.config
            .driver
            .templatedir
            .as_deref()
            .map(|raw| Ok(absolute_from(&self.cwd, &store.substitute(raw)?)))
            .transpose()
    }

    /// Resolves the task's store, directories, parameters and commands.
    ///
    /// Any error here means the configuration cannot produce this task.
    pub fn prepare(&self, task: Task, thread: &str) -> Result<PreparedTask> {
        let driver = &self.config.driver;
        let assignment = task.bindings();

        let mut runtime = BTreeMap::from([
            (THREAD.to_string(), text_value(thread)),
            (RUNNAME.to_string(), text_value(&self.run.name)),
        ]);

        let draft = self.store(&runtime, Some(assignment.clone()));
        let templatedir = self.templatedir(&draft)?;
        let taskdir = match driver.taskdir.as_deref() {
            Some(raw) => absolute_from(&self.cwd, &draft.substitute(raw)?),
            None => self.cwd.clone(),
        };

        if let Some(dir) = templatedir.as_ref().filter(|dir| taskdir.starts_with(dir)) {
            return Err(Error::config(format!(
                "{}: task directory {} lies inside template directory {}",
                task.label(),
                taskdir.display(),
                dir.display()
            )));
        }

        if let Some(dir) = &templatedir {
            runtime.insert(TEMPLATEDIR.to_string(), path_value(dir));
        }
        runtime.insert(TASKDIR.to_string(), path_value(&taskdir));
        let store = self.store(&runtime, Some(assignment));

        let roots: Vec<String> = self
            .config
            .userdef
            .keys()
            .chain(self.run.parameters.keys())
            .chain(task.assignment.keys())
            .cloned()
            .collect();
        let parameters = resolve_parameters(&store, roots.iter().map(String::as_str))?;

        let commands = Phase::COMMANDS
            .iter()
            .filter_map(|phase| driver.command(*phase).map(|command| (*phase, command)))
            .map(|(phase, command)| Ok((phase, store.substitute(command)?)))
            .collect::<Result<Vec<_>>>()?;

        trace!("{}: taskdir {}", task.label(), taskdir.display());

        Ok(PreparedTask {
            task,
            thread: thread.to_string(),
            store,
            parameters,
            taskdir,
            templatedir,
            commands,
        })
    }

    /// Store used for rendering a run's submit script: no variable
    /// assignment, plus `ntasks`.
    pub fn run_store(&self, ntasks: usize, thread: &str) -> Result<ParameterStore> {
        let mut runtime = BTreeMap::from([
            (THREAD.to_string(), text_value(thread)),
            (RUNNAME.to_string(), text_value(&self.run.name)),
            (NTASKS.to_string(), ParamValue::Scalar(Scalar::Int(ntasks as i64))),
        ]);

        let draft = self.store(&runtime, None);
        if let Some(dir) = self.templatedir(&draft)? {
            runtime.insert(TEMPLATEDIR.to_string(), path_value(&dir));
        }
        Ok(self.store(&runtime, None))
    }
}

fn text_value(text: &str) -> ParamValue {
    ParamValue::Scalar(Scalar::Str(text.to_string()))
}

fn path_value(path: &Path) -> ParamValue {
    ParamValue::Scalar(Scalar::Str(path.to_string_lossy().into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverOptions;
    use crate::tasks::TaskGenerator;

    fn context() -> StaticContext {
        StaticContext::new("/work", "/opt/chauffeur")
    }

    fn squared_run() -> RunSpec {
        RunSpec::new("run_a")
            .with_variable("num", vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)])
            .with_parameter("squared", "`pow(%(num),2)`")
    }

    fn config(driver: DriverOptions, run: RunSpec) -> Config {
        Config {
            driver,
            runs: vec![run],
            ..Config::default()
        }
    }

    #[test]
    fn test_squared_parameters_per_task() {
        let config = config(DriverOptions::default(), squared_run());
        let preparer = TaskPreparer::new(&config, &config.runs[0], &context());

        let resolved: Vec<(Scalar, Scalar)> = TaskGenerator::new(&config.runs[0])
            .unwrap()
            .map(|task| preparer.prepare(task, "01").unwrap())
            .map(|p| (p.parameters["num"].clone(), p.parameters["squared"].clone()))
            .collect();

        assert_eq!(
            resolved,
            vec![
                (Scalar::Int(1), Scalar::Float(1.0)),
                (Scalar::Int(2), Scalar::Float(4.0)),
                (Scalar::Int(3), Scalar::Float(9.0)),
            ]
        );
    }

    #[test]
    fn test_taskdir_and_commands_substituted() {
        let driver = DriverOptions {
            taskdir: Some("runs/%(runname)/num_%(num:02d)".to_string()),
            templatedir: Some("~/templates/../template".to_string()),
            execcommand: Some("./sim --squared %(squared) --dir %(taskdir)".to_string()),
            postcommand: Some("echo %(thread)".to_string()),
            ..DriverOptions::default()
        };
        let config = config(driver, squared_run());
        let preparer = TaskPreparer::new(&config, &config.runs[0], &context());
        let task = TaskGenerator::new(&config.runs[0]).unwrap().nth(2).unwrap();

        let prepared = preparer.prepare(task, "03").unwrap();
        assert_eq!(prepared.taskdir, PathBuf::from("/work/runs/run_a/num_03"));
        assert!(prepared
            .templatedir
            .as_ref()
            .is_some_and(|dir| dir.ends_with("template")));
        assert_eq!(
            prepared.commands,
            vec![
                (Phase::Exec, "./sim --squared 9.0 --dir /work/runs/run_a/num_03".to_string()),
                (Phase::Post, "echo 03".to_string()),
            ]
        );
    }

    #[test]
    fn test_taskdir_inside_templatedir_rejected() {
        let driver = DriverOptions {
            taskdir: Some("template/num_%(num)".to_string()),
            templatedir: Some("template".to_string()),
            ..DriverOptions::default()
        };
        let config = config(driver, squared_run());
        let preparer = TaskPreparer::new(&config, &config.runs[0], &context());
        let task = TaskGenerator::new(&config.runs[0]).unwrap().next().unwrap();

        let err = preparer.prepare(task, "01").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("inside template directory"));
    }

    #[test]
    fn test_default_taskdir_is_cwd() {
        let config = config(DriverOptions::default(), squared_run());
        let preparer = TaskPreparer::new(&config, &config.runs[0], &context());
        let task = TaskGenerator::new(&config.runs[0]).unwrap().next().unwrap();
        let prepared = preparer.prepare(task, "01").unwrap();
        assert_eq!(prepared.taskdir, PathBuf::from("/work"));
        assert!(prepared.commands.is_empty());
    }

    #[test]
    fn test_userdef_references_run_parameter() {
        let mut config = config(DriverOptions::default(), squared_run());
        config
            .userdef
            .insert("cube".to_string(), ParamValue::from("`%(squared)*%(num)`"));
        let preparer = TaskPreparer::new(&config, &config.runs[0], &context());
        let task = TaskGenerator::new(&config.runs[0]).unwrap().nth(1).unwrap();

        let prepared = preparer.prepare(task, "01").unwrap();
        assert_eq!(prepared.parameters["cube"], Scalar::Float(8.0));
    }

    #[test]
    fn test_prepare_reports_cycles() {
        let run = squared_run()
            .with_parameter("a", "`%(b)+1`")
            .with_parameter("b", "`%(a)+1`");
        let config = config(DriverOptions::default(), run);
        let preparer = TaskPreparer::new(&config, &config.runs[0], &context());
        let task = TaskGenerator::new(&config.runs[0]).unwrap().next().unwrap();

        assert!(matches!(
            preparer.prepare(task, "01"),
            Err(Error::CyclicExpression(_))
        ));
    }

    #[test]
    fn test_prepare_reports_unresolved_command() {
        let driver = DriverOptions {
            execcommand: Some("./sim %(missing)".to_string()),
            ..DriverOptions::default()
        };
        let config = config(driver, squared_run());
        let preparer = TaskPreparer::new(&config, &config.runs[0], &context());
        let task = TaskGenerator::new(&config.runs[0]).unwrap().next().unwrap();

        assert!(matches!(
            preparer.prepare(task, "01"),
            Err(Error::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_run_store_binds_ntasks() {
        let config = config(DriverOptions::default(), squared_run());
        let preparer = TaskPreparer::new(&config, &config.runs[0], &context());
        let store = preparer.run_store(3, "main").unwrap();
        assert_eq!(
            store.substitute("%(runname): %(ntasks) tasks from %(cwd)").unwrap(),
            "run_a: 3 tasks from /work"
        );
        assert!(!store.contains("num"));
    }
}
