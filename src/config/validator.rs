//! Configuration Validation
//!
//! Shape checks run once after loading, before any task is generated:
//! - at least one run section, each with non-empty variables
//! - `variableorder` naming exactly the run's variables
//! - no name bound both as a variable and as a run parameter
//! - file directives with somewhere to write to
//! - a usable thread count
//!
//! Duplicate values inside a variable's list are dropped here so every
//! generated assignment is distinct.

use log::{debug, info, warn};

use super::model::{Config, ExecutionMode, RunSpec};
use super::value::Scalar;
use crate::error::{Error, Result};
use crate::tasks::resolve_variable_order;

/// Validates the configuration, normalising variable lists in place.
pub fn validate_config(config: &mut Config) -> Result<()> {
    info!("Validating configuration with {} run sections", config.runs.len());

    if config.runs.is_empty() {
        return Err(Error::config("no run sections declared"));
    }

    let mut problems = Vec::new();

    if config.driver.nthreads == 0 {
        problems.push("driver.nthreads must be at least 1".to_string());
    } else if config.driver.nthreads > num_cpus::get() {
        warn!(
            "nthreads = {} exceeds the {} available CPUs",
            config.driver.nthreads,
            num_cpus::get()
        );
    }

    for file in &config.files {
        if file.input.trim().is_empty() {
            problems.push(format!("{}: input path is empty", file.name));
        }
        if file.output.is_none() && !(file.is_pbs() && config.driver.pbs_submitscript.is_some()) {
            problems.push(format!("{}: no output path given", file.name));
        }
    }

    if config.pbs_files().count() > 0 && config.driver.mode != ExecutionMode::Setup {
        debug!("PBS file directives are only rendered in setup mode");
    }

    for run in &mut config.runs {
        problems.extend(validate_run(run)?);
    }

    if !problems.is_empty() {
        return Err(Error::config(problems.join("\n")));
    }

    let has_commands = [
        &config.driver.precommand,
        &config.driver.execcommand,
        &config.driver.postcommand,
    ]
    .iter()
    .any(|c| c.is_some());
    if !has_commands {
        warn!("No pre/exec/post command configured; tasks will only be set up");
    }

    info!("Configuration validated");
    Ok(())
}

/// Checks a single run; returns soft problems, fails hard on a bad order.
fn validate_run(run: &mut RunSpec) -> Result<Vec<String>> {
    let mut problems = Vec::new();

    if run.variables.is_empty() {
        problems.push(format!("{}: no variables declared", run.name));
        return Ok(problems);
    }

    for (name, values) in &mut run.variables {
        if values.is_empty() {
            problems.push(format!("{}: variable '{}' has no values", run.name, name));
            continue;
        }

        let before = values.len();
        dedup_preserving_order(values);
        if values.len() != before {
            warn!(
                "{}: dropped {} duplicate value(s) of variable '{}'",
                run.name,
                before - values.len(),
                name
            );
        }

        if run.parameters.contains_key(name) {
            problems.push(format!(
                "{}: '{}' is declared both as a variable and as a parameter",
                run.name, name
            ));
        }
    }

    let order = resolve_variable_order(run)?;
    debug!("{}: enumeration order (fastest first) {:?}", run.name, order);

    Ok(problems)
}

fn dedup_preserving_order(values: &mut Vec<Scalar>) {
    let mut seen: Vec<Scalar> = Vec::with_capacity(values.len());
    values.retain(|v| {
        if seen.contains(v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileDirective, FileKind};

    fn config_with(run: RunSpec) -> Config {
        Config {
            runs: vec![run],
            ..Config::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = config_with(
            RunSpec::new("run").with_variable("num", vec![Scalar::Int(1), Scalar::Int(2)]),
        );
        assert!(validate_config(&mut config).is_ok());
    }

    #[test]
    fn test_no_runs() {
        let mut config = Config::default();
        assert!(matches!(validate_config(&mut config), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_variables() {
        let mut config = config_with(RunSpec::new("run"));
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn test_variable_without_values() {
        let mut config = config_with(RunSpec::new("run").with_variable("num", vec![]));
        let err = validate_config(&mut config).unwrap_err();
        assert!(err.to_string().contains("has no values"));
    }

    #[test]
    fn test_invalid_variable_order() {
        let mut config = config_with(
            RunSpec::new("run")
                .with_variable("a", vec![Scalar::Int(1)])
                .with_variable("b", vec![Scalar::Int(2)])
                .with_order(&["a", "c"]),
        );
        assert!(matches!(
            validate_config(&mut config),
            Err(Error::InvalidVariableOrder { .. })
        ));
    }

    #[test]
    fn test_duplicate_values_dropped() {
        let mut config = config_with(RunSpec::new("run").with_variable(
            "num",
            vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(1)],
        ));
        validate_config(&mut config).unwrap();
        assert_eq!(
            config.runs[0].variables["num"],
            vec![Scalar::Int(1), Scalar::Int(2)]
        );
    }

    #[test]
    fn test_variable_parameter_collision() {
        let mut config = config_with(
            RunSpec::new("run")
                .with_variable("num", vec![Scalar::Int(1)])
                .with_parameter("num", 5i64),
        );
        let err = validate_config(&mut config).unwrap_err();
        assert!(err.to_string().contains("both as a variable and as a parameter"));
    }

    #[test]
    fn test_zero_threads() {
        let mut config =
            config_with(RunSpec::new("run").with_variable("x", vec![Scalar::Int(1)]));
        config.driver.nthreads = 0;
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn test_pbs_directive_needs_destination() {
        let mut config =
            config_with(RunSpec::new("run").with_variable("x", vec![Scalar::Int(1)]));
        let mut pbs = FileDirective::new("pbsfile", "submit.tmpl", "unused");
        pbs.output = None;
        pbs.kind = FileKind::Pbs;
        config.files.push(pbs);

        assert!(validate_config(&mut config).is_err());

        config.driver.pbs_submitscript = Some("submit.sh".to_string());
        assert!(validate_config(&mut config).is_ok());
    }
}
