//! Configuration Loader
//!
//! Reads a sweep configuration document and turns its loosely named
//! top-level sections into typed lists:
//!
//! - `driver` → [`DriverOptions`]
//! - `userdef` → auxiliary parameters
//! - every key containing `file` → a [`FileDirective`]
//! - every key containing `run` → a [`RunSpec`], in lexicographic key order

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde_yaml::Value;

use super::model::{Config, DriverOptions, FileDirective, RunSpec};
use super::validator::validate_config;
use crate::error::{Error, Result};

/// Loads, parses and validates a configuration file.
///
/// # Example
///
/// ```rust,no_run
/// use chauffeur::config::load_config;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_config("input.yaml")?;
///     println!("Loaded {} run sections", config.runs.len());
///     Ok(())
/// }
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    let mut config = parse_config(&yaml_content)?;
    validate_config(&mut config)?;
    Ok(config)
}

/// Parses a configuration document without validating it.
pub fn parse_config(yaml_content: &str) -> Result<Config> {
    let document: Value = serde_yaml::from_str(yaml_content)?;
    let Value::Mapping(root) = document else {
        return Err(Error::config("top level of the document must be a mapping"));
    };

    let mut config = Config::default();
    let mut run_sections: Vec<(String, Value)> = Vec::new();
    let mut file_sections: Vec<(String, Value)> = Vec::new();

    for (key, value) in root {
        let Some(key) = key.as_str().map(str::to_string) else {
            return Err(Error::config(format!("section key {:?} is not a string", key)));
        };

        match classify_section(&key)? {
            Section::Driver => {
                config.driver = if value.is_null() {
                    DriverOptions::default()
                } else {
                    serde_yaml::from_value(value)
                        .map_err(|e| Error::config(format!("driver: {}", e)))?
                };
            }
            Section::Userdef => {
                if !value.is_null() {
                    config.userdef = serde_yaml::from_value(value)
                        .map_err(|e| Error::config(format!("userdef: {}", e)))?;
                }
            }
            Section::File => file_sections.push((key, value)),
            Section::Run => run_sections.push((key, value)),
        }
    }

    file_sections.sort_by(|a, b| a.0.cmp(&b.0));
    run_sections.sort_by(|a, b| a.0.cmp(&b.0));

    for (key, value) in file_sections {
        let mut directive: FileDirective = serde_yaml::from_value(value)
            .map_err(|e| Error::config(format!("{}: {}", key, e)))?;
        directive.name = key;
        config.files.push(directive);
    }

    for (key, value) in run_sections {
        let mut run: RunSpec = serde_yaml::from_value(value)
            .map_err(|e| Error::config(format!("{}: {}", key, e)))?;
        run.name = key;
        config.runs.push(run);
    }

    info!(
        "Parsed {} run sections, {} file directives, {} user parameters",
        config.runs.len(),
        config.files.len(),
        config.userdef.len()
    );

    Ok(config)
}

enum Section {
    Driver,
    Userdef,
    File,
    Run,
}

fn classify_section(key: &str) -> Result<Section> {
    let lower = key.to_lowercase();
    match lower.as_str() {
        "driver" => return Ok(Section::Driver),
        "userdef" => return Ok(Section::Userdef),
        _ => {}
    }

    match (lower.contains("file"), lower.contains("run")) {
        (true, true) => Err(Error::config(format!(
            "section '{}' is ambiguous: its key names both a file and a run",
            key
        ))),
        (true, false) => Ok(Section::File),
        (false, true) => Ok(Section::Run),
        (false, false) => Err(Error::config(format!(
            "unknown section '{}' (expected driver, userdef, *file* or *run*)",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutionMode, FileKind, Scalar};

    const SAMPLE: &str = r#"
driver:
  taskdir: "%(cwd)/runs/%(num)"
  execcommand: "echo %(num)"
  type: setup
userdef:
  label: sweep
run_b:
  variables:
    num: [3, 4]
run_a:
  variables:
    num: [1, 2]
  parameters:
    squared: "`pow(%(num),2)`"
paramfile:
  input: input.tmpl
  output: input.par
pbsfile:
  input: submit.tmpl
  type: pbs
"#;

    #[test]
    fn test_parse_sections() {
        let config = parse_config(SAMPLE).unwrap();

        assert_eq!(config.driver.mode, ExecutionMode::Setup);
        assert_eq!(config.userdef.len(), 1);
        assert_eq!(config.files.len(), 2);
        assert_eq!(config.runs.len(), 2);
    }

    #[test]
    fn test_runs_sorted_lexicographically() {
        let config = parse_config(SAMPLE).unwrap();
        let names: Vec<_> = config.runs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["run_a", "run_b"]);
        assert_eq!(config.runs[0].variables["num"], vec![Scalar::Int(1), Scalar::Int(2)]);
    }

    #[test]
    fn test_file_directives_named() {
        let config = parse_config(SAMPLE).unwrap();
        let pbs: Vec<_> = config.pbs_files().collect();
        assert_eq!(pbs.len(), 1);
        assert_eq!(pbs[0].name, "pbsfile");
        assert_eq!(pbs[0].kind, FileKind::Pbs);
        assert_eq!(config.task_files().count(), 1);
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = parse_config("driver: {}\nsomething: 1\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_ambiguous_section_rejected() {
        let result = parse_config("runfile:\n  input: a\n");
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("ambiguous")));
    }

    #[test]
    fn test_section_keys_case_insensitive() {
        let config = parse_config("Run1:\n  variables:\n    x: [1]\nDRIVER: {}\n").unwrap();
        assert_eq!(config.runs.len(), 1);
        assert_eq!(config.runs[0].name, "Run1");
    }

    #[test]
    fn test_non_mapping_document() {
        assert!(parse_config("- a\n- b\n").is_err());
        assert!(parse_config("42").is_err());
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config("/nonexistent/path/input.yaml");
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_load_config_valid_yaml() {
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("input.yaml");
        std::fs::write(&path, "run:\n  variables:\n    x: [1, 2]\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.runs.len(), 1);
        assert_eq!(config.runs[0].name, "run");
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.yaml");
        std::fs::write(&path, "this is not valid yaml: [[[").unwrap();

        assert!(load_config(&path).is_err());
    }
}
