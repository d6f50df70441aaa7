//! Sweep Execution Engine
//!
//! Orchestrates a whole sweep:
//! - a preflight pass prepares every task of every run, so malformed
//!   parameters, cycles and bad variable orders abort the sweep before any
//!   task touches the filesystem
//! - in setup mode, each run's submit script is rendered once
//! - tasks are dispatched in enumeration order, either on the calling
//!   thread or on a pool of `nthreads` named workers fed through a bounded
//!   channel
//! - outcomes flow back to the calling thread, which records the report
//!   and the timeline
//!
//! A failing task never aborts its siblings. With `stoponfailure`, no new
//! task is started after the first failure; running tasks complete.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use log::{debug, error, info, warn};

use super::context::TaskPreparer;
use super::report::{RunReport, TaskRecord, TaskStatus};
use super::task::TaskRunner;
use super::Phase;
use crate::config::model::{Config, ExecutionMode};
use crate::error::{Error, Result};
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::params::StaticContext;
use crate::render::Renderer;
use crate::tasks::{Task, TaskGenerator};

/// Sweep execution engine.
///
/// # Example
///
/// ```rust,no_run
/// use chauffeur::config::load_config;
/// use chauffeur::execution::Engine;
/// use chauffeur::params::StaticContext;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_config("input.yaml")?;
///     let mut engine = Engine::new(config, StaticContext::detect()?);
///     engine.set_config_path("input.yaml");
///
///     let report = engine.run()?;
///     println!("{} tasks done", report.counts().done);
///     Ok(())
/// }
/// ```
pub struct Engine {
    config: Config,
    context: StaticContext,
    config_path: String,
}

/// A task waiting for a worker.
struct Job {
    run: usize,
    task: Task,
}

/// Message from a worker to the dispatching thread.
enum WorkerEvent {
    Started { label: String, at: Instant },
    Finished { record: TaskRecord, at: Instant },
}

/// State shared by everything that executes tasks.
struct Dispatch<'a> {
    preparers: &'a [TaskPreparer<'a>],
    runner: TaskRunner<'a>,
    stop_on_failure: bool,
    stop: AtomicBool,
    started: AtomicUsize,
}

impl Engine {
    pub fn new(config: Config, context: StaticContext) -> Self {
        Self {
            config,
            context,
            config_path: "input.yaml".to_string(),
        }
    }

    /// Sets the configuration path recorded in the report.
    pub fn set_config_path(&mut self, path: impl Into<String>) {
        self.config_path = path.into();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the sweep.
    ///
    /// # Returns
    ///
    /// * `Ok(report)` - every task reached a terminal state; failed tasks
    ///   are recorded in the report
    /// * `Err` - the configuration cannot produce its tasks, or a submit
    ///   script could not be rendered
    pub fn run(&self) -> Result<RunReport> {
        let driver = &self.config.driver;

        let preparers: Vec<TaskPreparer> = self
            .config
            .runs
            .iter()
            .map(|run| TaskPreparer::new(&self.config, run, &self.context))
            .collect();

        let generators = self.preflight(&preparers)?;
        let total: usize = generators.iter().map(TaskGenerator::total).sum();

        let renderer = Renderer::new(self.context.cwd(), driver.default_formats());
        if driver.mode == ExecutionMode::Setup {
            self.render_submit_scripts(&renderer, &preparers, &generators)?;
        }

        info!(
            "Starting execution ({} tasks, threads: {}, mode: {:?}, dry run: {})",
            total, driver.nthreads, driver.mode, driver.dryrun
        );

        let dispatch = Dispatch {
            preparers: &preparers,
            runner: TaskRunner::new(&self.config, &renderer),
            stop_on_failure: driver.stoponfailure,
            stop: AtomicBool::new(false),
            started: AtomicUsize::new(0),
        };
        let jobs = generators
            .into_iter()
            .enumerate()
            .flat_map(|(run, generator)| generator.map(move |task| Job { run, task }));

        let mut report = RunReport::new(self.config_path.clone());
        let mut timeline = ExecutionTimeline::new();

        if driver.nthreads <= 1 {
            run_sequential(&dispatch, jobs, &mut report, &mut timeline);
        } else {
            run_pool(&dispatch, jobs, driver.nthreads, &mut report, &mut timeline)?;
        }

        let started = dispatch.started.load(Ordering::SeqCst);
        if started < total {
            let reason = format!(
                "stopped after a failure; {} of {} tasks not started",
                total - started,
                total
            );
            warn!("{}", reason);
            report.stopped = Some(reason);
        }

        report.finish();
        debug!("{}", timeline.gantt_chart());
        info!(
            "Finished {} tasks in {:.2?} (peak concurrency: {})",
            report.tasks.len(),
            timeline.elapsed(),
            timeline.peak_concurrency()
        );

        Ok(report)
    }

    /// Prepares every task once and returns fresh generators for dispatch.
    fn preflight(&self, preparers: &[TaskPreparer]) -> Result<Vec<TaskGenerator>> {
        info!("Resolving tasks of {} runs", preparers.len());

        let thread = current_thread_name();
        let mut generators = Vec::with_capacity(preparers.len());
        let mut taskdirs: HashSet<PathBuf> = HashSet::new();
        let mut shared = false;

        for preparer in preparers {
            let generator = TaskGenerator::new(preparer.run())?;

            for task in generator.clone() {
                let label = task.label();
                let prepared = preparer.prepare(task, &thread).map_err(|e| {
                    error!("{}: {}", label, e);
                    e
                })?;
                shared |= !taskdirs.insert(prepared.taskdir);
            }

            info!("{}: {} tasks", preparer.run().name, generator.total());
            generators.push(generator);
        }

        if shared && self.config.driver.nthreads > 1 {
            warn!(
                "Several tasks share a task directory while running on {} threads",
                self.config.driver.nthreads
            );
        }

        Ok(generators)
    }

    /// Renders each `pbs` file directive once per run.
    fn render_submit_scripts(
        &self,
        renderer: &Renderer,
        preparers: &[TaskPreparer],
        generators: &[TaskGenerator],
    ) -> Result<()> {
        let driver = &self.config.driver;
        let thread = current_thread_name();

        for (preparer, generator) in preparers.iter().zip(generators) {
            let run = &preparer.run().name;
            let store = preparer.run_store(generator.total(), &thread)?;

            for directive in self.config.pbs_files() {
                let output = match driver.pbs_submitscript.as_deref() {
                    Some(raw) => self.context.absolute_path(&store.substitute(raw)?),
                    None => renderer.output_path(directive, &store, self.context.cwd())?,
                };

                if driver.dryrun {
                    info!("[DRY RUN] {}: render submit script {}", run, output.display());
                    continue;
                }

                renderer.render_file_to(directive, &store, &output)?;
                info!(
                    "{}: submit with `{} {}`",
                    run,
                    driver.pbs_subcommand,
                    output.display()
                );
            }
        }

        Ok(())
    }
}

impl Dispatch<'_> {
    /// Prepares and runs one job; returns `None` once submission stopped.
    fn execute(&self, job: Job, thread: &str) -> Option<TaskRecord> {
        if self.stop.load(Ordering::SeqCst) {
            return None;
        }
        self.started.fetch_add(1, Ordering::SeqCst);

        let record = match self.preparers[job.run].prepare(job.task.clone(), thread) {
            Ok(prepared) => self.runner.run(&prepared),
            Err(e) => {
                error!("{}: {}", job.task.label(), e);
                TaskRecord {
                    run: job.task.run,
                    index: job.task.index,
                    assignment: job.task.assignment,
                    taskdir: PathBuf::new(),
                    thread: thread.to_string(),
                    phases: Vec::new(),
                    status: TaskStatus::Failed {
                        phase: Phase::Setup,
                        cause: e.to_string(),
                    },
                    duration_ms: 0,
                }
            }
        };

        if record.status.is_failure() && self.stop_on_failure {
            self.stop.store(true, Ordering::SeqCst);
        }
        Some(record)
    }

    /// Worker loop: pull jobs until the channel closes.
    fn work(&self, jobs: &Mutex<Receiver<Job>>, events: Sender<WorkerEvent>) {
        let thread = current_thread_name();
        debug!("Worker started");

        loop {
            let job = match jobs.lock() {
                Ok(receiver) => receiver.recv(),
                Err(_) => break,
            };
            let Ok(job) = job else {
                break;
            };

            let label = job.task.label();
            let started = Instant::now();
            let Some(record) = self.execute(job, &thread) else {
                continue;
            };

            for event in [
                WorkerEvent::Started { label, at: started },
                WorkerEvent::Finished {
                    record,
                    at: Instant::now(),
                },
            ] {
                if let Err(e) = events.send(event) {
                    error!("Failed to send completion signal: {}", e);
                }
            }
        }

        debug!("Worker finished");
    }
}

fn run_sequential(
    dispatch: &Dispatch,
    jobs: impl Iterator<Item = Job>,
    report: &mut RunReport,
    timeline: &mut ExecutionTimeline,
) {
    let thread = current_thread_name();

    for job in jobs {
        let label = job.task.label();
        let started = Instant::now();
        let Some(record) = dispatch.execute(job, &thread) else {
            break;
        };

        timeline.add_event_at(label.as_str(), EventType::Started, started);
        timeline.add_event(label, event_type(&record.status));
        report.push(record);
    }
}

fn run_pool(
    dispatch: &Dispatch,
    jobs: impl Iterator<Item = Job> + Send,
    nthreads: usize,
    report: &mut RunReport,
    timeline: &mut ExecutionTimeline,
) -> Result<()> {
    let (job_tx, job_rx) = mpsc::sync_channel::<Job>(nthreads);
    let job_rx = Mutex::new(job_rx);
    let (event_tx, event_rx) = mpsc::channel::<WorkerEvent>();

    thread::scope(|scope| -> Result<()> {
        for i in 1..=nthreads {
            let events = event_tx.clone();
            let job_rx = &job_rx;
            thread::Builder::new()
                .name(format!("{:02}", i))
                .spawn_scoped(scope, move || dispatch.work(job_rx, events))
                .map_err(|e| Error::io("<worker thread>", e))?;
        }
        drop(event_tx);
        info!("Started {} worker threads", nthreads);

        scope.spawn(move || {
            for job in jobs {
                if dispatch.stop.load(Ordering::SeqCst) || job_tx.send(job).is_err() {
                    break;
                }
            }
        });

        for event in event_rx {
            match event {
                WorkerEvent::Started { label, at } => {
                    timeline.add_event_at(label, EventType::Started, at)
                }
                WorkerEvent::Finished { record, at } => {
                    timeline.add_event_at(record.label(), event_type(&record.status), at);
                    report.push(record);
                }
            }
        }

        Ok(())
    })
}

fn event_type(status: &TaskStatus) -> EventType {
    if status.is_failure() {
        EventType::Failed
    } else {
        EventType::Completed
    }
}

fn current_thread_name() -> String {
    thread::current().name().unwrap_or("main").to_string()
}
