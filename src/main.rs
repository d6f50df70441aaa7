//! Chauffeur CLI Entry Point
//!
//! # Usage
//!
//! ```bash
//! # Run the sweep described in ./input.yaml
//! chauffeur
//!
//! # Another configuration on 8 worker threads
//! chauffeur -i sweep.yaml -n 8
//!
//! # Preview what would happen
//! chauffeur --dry-run
//!
//! # Only create task directories and the submit script
//! chauffeur --setup-only
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use log::{error, info, warn};

use chauffeur::config::{load_config, ExecutionMode};
use chauffeur::execution::{Engine, RunReport, TaskStatus, DEFAULT_REPORT_DIR};
use chauffeur::params::StaticContext;
use chauffeur::{APP_NAME, VERSION};

/// Drives repeated executions of a program over a parameter space.
#[derive(Parser, Debug)]
#[command(name = "chauffeur", version, about)]
struct Cli {
    /// Sweep configuration file.
    #[arg(short, long, default_value = "input.yaml")]
    input: PathBuf,

    /// Log what would be done without touching the filesystem.
    #[arg(long)]
    dry_run: bool,

    /// Number of worker threads (overrides `driver.nthreads`).
    #[arg(short, long)]
    nthreads: Option<usize>,

    /// Stop after setting up task directories.
    #[arg(long)]
    setup_only: bool,

    /// Re-run tasks whose directory already exists.
    #[arg(long)]
    no_skip: bool,

    /// Start no new task after the first failure.
    #[arg(long)]
    stop_on_failure: bool,

    /// Print the parsed configuration as YAML and exit.
    #[arg(long)]
    print_config: bool,

    /// Directory the run report is written to.
    #[arg(long, default_value = DEFAULT_REPORT_DIR)]
    report_dir: PathBuf,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

/// Configures logging as `[date time t-thread] LEVEL: message`.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            let thread = std::thread::current();
            writeln!(
                buf,
                "[{} t-{}] {}: {}",
                chrono::Local::now().format("%m/%d/%Y %H:%M:%S"),
                thread.name().unwrap_or("main"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!();
}

fn print_summary(report: &RunReport) {
    let counts = report.counts();

    println!();
    println!("{}", "Summary".bold());
    println!("  {:8} {}", "DONE".green(), counts.done);
    if counts.skipped > 0 {
        println!("  {:8} {}", "SKIPPED".yellow(), counts.skipped);
    }
    if counts.planned > 0 {
        println!("  {:8} {}", "PLANNED".cyan(), counts.planned);
    }
    println!("  {:8} {}", "FAILED".red(), counts.failed);

    for record in report.failures() {
        if let TaskStatus::Failed { phase, cause } = &record.status {
            println!("  {} {} ({}): {}", "✗".red(), record.label(), phase, cause);
        }
    }
    if let Some(reason) = &report.stopped {
        println!("  {}", reason.yellow());
    }
    println!();
}

/// Main application entry point; returns whether every task succeeded.
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let input = cli.input.to_string_lossy().into_owned();
    let mut config = load_config(&cli.input).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        format!("Could not load configuration from '{}': {}", input, e)
    })?;

    let driver = &mut config.driver;
    if let Some(n) = cli.nthreads {
        if n == 0 {
            return Err("--nthreads must be at least 1".into());
        }
        driver.nthreads = n;
    }
    driver.dryrun |= cli.dry_run;
    driver.stoponfailure |= cli.stop_on_failure;
    if cli.setup_only {
        driver.mode = ExecutionMode::Setup;
    }
    if cli.no_skip {
        driver.skipifexist = false;
    }

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(true);
    }

    if config.driver.dryrun {
        info!("Mode: DRY RUN (nothing will be created or executed)");
    }

    let context = StaticContext::detect()?;
    info!("Working directory: {}", context.cwd().display());

    let mut engine = Engine::new(config, context);
    engine.set_config_path(input);
    let report = engine.run()?;

    if let Err(e) = report.save(&cli.report_dir) {
        warn!("Could not save run report: {}", e);
    }

    print_summary(&report);
    Ok(report.is_success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    if !cli.print_config {
        print_banner();
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}
