//! Sweep Configuration Model
//!
//! Typed form of a sweep configuration document.
//!
//! # Example YAML Format
//!
//! ```yaml
//! driver:
//!   taskdir: "%(cwd)/runs/num_%(num:03d)"
//!   templatedir: "%(cwd)/template"
//!   execcommand: "./simulate input.par > log.txt"
//!   nthreads: 4
//!
//! userdef:
//!   dt: 0.01
//!
//! file_params:
//!   input: "%(cwd)/input.par.tmpl"
//!   output: input.par
//!
//! run_a:
//!   variables:
//!     num: [1, 2, 3]
//!   parameters:
//!     squared: "`pow(%(num),2)`"
//! ```

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use super::value::{ParamValue, Scalar};
use crate::error::Result;
use crate::execution::Phase;
use crate::params::DefaultFormats;

/// Default submit command written into the PBS hint.
pub const DEFAULT_PBS_SUBCOMMAND: &str = "qsub";

/// How far each task's state machine proceeds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Setup followed by the pre, exec and post commands.
    #[default]
    Exec,
    /// Setup only; PBS scripts are rendered once per run.
    Setup,
}

/// Options of the `driver` section.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DriverOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precommand: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execcommand: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcommand: Option<String>,

    /// Templated task directory; the invocation directory when unset
    #[serde(default, alias = "rundir", skip_serializing_if = "Option::is_none")]
    pub taskdir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templatedir: Option<String>,

    #[serde(default, rename = "type")]
    pub mode: ExecutionMode,

    #[serde(default = "default_true")]
    pub skipifexist: bool,

    #[serde(default = "default_nthreads")]
    pub nthreads: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbs_submitscript: Option<String>,

    #[serde(default = "default_subcommand")]
    pub pbs_subcommand: String,

    /// Log actions without touching the filesystem or running commands
    #[serde(default)]
    pub dryrun: bool,

    /// Default printf spec for integers substituted into rendered files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intformat: Option<String>,

    /// Default printf spec for floats substituted into rendered files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floatformat: Option<String>,

    /// Stop submitting tasks after the first failure
    #[serde(default)]
    pub stoponfailure: bool,
}

fn default_true() -> bool {
    true
}

fn default_nthreads() -> usize {
    1
}

fn default_subcommand() -> String {
    DEFAULT_PBS_SUBCOMMAND.to_string()
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            precommand: None,
            execcommand: None,
            postcommand: None,
            taskdir: None,
            templatedir: None,
            mode: ExecutionMode::Exec,
            skipifexist: true,
            nthreads: 1,
            pbs_submitscript: None,
            pbs_subcommand: default_subcommand(),
            dryrun: false,
            intformat: None,
            floatformat: None,
            stoponfailure: false,
        }
    }
}

impl DriverOptions {
    /// Command template configured for a phase, if any.
    pub fn command(&self, phase: Phase) -> Option<&str> {
        match phase {
            Phase::Setup => None,
            Phase::Pre => self.precommand.as_deref(),
            Phase::Exec => self.execcommand.as_deref(),
            Phase::Post => self.postcommand.as_deref(),
        }
    }

    pub fn default_formats(&self) -> DefaultFormats {
        DefaultFormats {
            int: self.intformat.clone(),
            float: self.floatformat.clone(),
        }
    }
}

/// Kind tag of a file directive.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Ordinary file rendered into every task directory
    #[default]
    #[serde(alias = "None")]
    None,
    /// Job-submission script rendered once per run in setup mode
    #[serde(alias = "PBS")]
    Pbs,
}

/// A template file rendered with a task's parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileDirective {
    /// Key of the section this directive came from
    #[serde(skip)]
    pub name: String,

    pub input: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, rename = "type", deserialize_with = "file_kind")]
    pub kind: FileKind,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParamValue>,
}

/// Accepts `type: None`, `type: pbs` and a missing or null tag.
fn file_kind<'de, D>(deserializer: D) -> std::result::Result<FileKind, D::Error>
where
    D: Deserializer<'de>,
{
    let kind: Option<FileKind> = Option::deserialize(deserializer)?;
    Ok(kind.unwrap_or_default())
}

impl FileDirective {
    pub fn new(name: impl Into<String>, input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            output: Some(output.into()),
            kind: FileKind::None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn is_pbs(&self) -> bool {
        self.kind == FileKind::Pbs
    }
}

/// One parameter space to sweep.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunSpec {
    /// Key of the section this run came from
    #[serde(skip)]
    pub name: String,

    /// Variable name -> values; a single scalar counts as a one-element list
    #[serde(deserialize_with = "variable_map")]
    pub variables: BTreeMap<String, Vec<Scalar>>,

    /// Explicit enumeration order, fastest-varying first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variableorder: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParamValue>,
}

fn variable_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Vec<Scalar>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Value> = BTreeMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, value)| {
            let values = match &value {
                Value::Sequence(items) => items
                    .iter()
                    .map(Scalar::from_yaml)
                    .collect::<std::result::Result<Vec<_>, _>>(),
                other => Scalar::from_yaml(other).map(|s| vec![s]),
            }
            .map_err(|e| de::Error::custom(format!("variable '{}': {}", name, e)))?;
            Ok((name, values))
        })
        .collect()
}

impl RunSpec {
    /// Creates a run with no parameters and the default variable order.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: BTreeMap::new(),
            variableorder: None,
            parameters: BTreeMap::new(),
        }
    }

    /// Adds a variable with its values.
    pub fn with_variable(mut self, name: impl Into<String>, values: Vec<Scalar>) -> Self {
        self.variables.insert(name.into(), values);
        self
    }

    /// Adds a run-level parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Sets the explicit variable order.
    pub fn with_order(mut self, order: &[&str]) -> Self {
        self.variableorder = Some(order.iter().map(|s| s.to_string()).collect());
        self
    }
}

/// A complete, typed sweep configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub driver: DriverOptions,
    pub userdef: BTreeMap<String, ParamValue>,
    /// File directives in key order
    pub files: Vec<FileDirective>,
    /// Run sections in lexicographic key order
    pub runs: Vec<RunSpec>,
}

impl Config {
    /// Directives rendered into each task directory.
    pub fn task_files(&self) -> impl Iterator<Item = &FileDirective> {
        self.files.iter().filter(|f| !f.is_pbs())
    }

    /// Directives describing job-submission scripts.
    pub fn pbs_files(&self) -> impl Iterator<Item = &FileDirective> {
        self.files.iter().filter(|f| f.is_pbs())
    }

    /// Serializes the configuration back into the document layout.
    pub fn to_yaml(&self) -> Result<String> {
        let mut doc = Mapping::new();
        doc.insert(Value::from("driver"), serde_yaml::to_value(&self.driver)?);
        if !self.userdef.is_empty() {
            doc.insert(Value::from("userdef"), serde_yaml::to_value(&self.userdef)?);
        }
        for file in &self.files {
            doc.insert(Value::from(file.name.as_str()), serde_yaml::to_value(file)?);
        }
        for run in &self.runs {
            doc.insert(Value::from(run.name.as_str()), serde_yaml::to_value(run)?);
        }
        Ok(serde_yaml::to_string(&doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_defaults() {
        let driver: DriverOptions = serde_yaml::from_str("{}").unwrap();
        assert_eq!(driver, DriverOptions::default());
        assert!(driver.skipifexist);
        assert_eq!(driver.nthreads, 1);
        assert_eq!(driver.mode, ExecutionMode::Exec);
        assert_eq!(driver.pbs_subcommand, "qsub");
    }

    #[test]
    fn test_driver_rundir_alias() {
        let driver: DriverOptions = serde_yaml::from_str("rundir: runs/%(num)").unwrap();
        assert_eq!(driver.taskdir.as_deref(), Some("runs/%(num)"));
    }

    #[test]
    fn test_driver_rejects_unknown_key() {
        let result: std::result::Result<DriverOptions, _> = serde_yaml::from_str("executable: sim");
        assert!(result.is_err());
    }

    #[test]
    fn test_driver_setup_mode() {
        let driver: DriverOptions = serde_yaml::from_str("type: setup\nnthreads: 4").unwrap();
        assert_eq!(driver.mode, ExecutionMode::Setup);
        assert_eq!(driver.nthreads, 4);
    }

    #[test]
    fn test_driver_phase_commands() {
        let driver = DriverOptions {
            precommand: Some("mkdir IO".to_string()),
            execcommand: Some("./sim".to_string()),
            ..DriverOptions::default()
        };
        assert_eq!(driver.command(Phase::Pre), Some("mkdir IO"));
        assert_eq!(driver.command(Phase::Exec), Some("./sim"));
        assert_eq!(driver.command(Phase::Post), None);
        assert_eq!(driver.command(Phase::Setup), None);
    }

    #[test]
    fn test_run_spec_scalar_promoted() {
        let run: RunSpec = serde_yaml::from_str("variables:\n  a: 5\n  b: [1, 2]").unwrap();
        assert_eq!(run.variables["a"], vec![Scalar::Int(5)]);
        assert_eq!(run.variables["b"].len(), 2);
        assert!(run.variableorder.is_none());
    }

    #[test]
    fn test_file_kind_variants() {
        let file: FileDirective = serde_yaml::from_str("input: a\noutput: b\ntype: None").unwrap();
        assert_eq!(file.kind, FileKind::None);

        let file: FileDirective = serde_yaml::from_str("input: a\ntype: pbs").unwrap();
        assert!(file.is_pbs());

        let file: FileDirective = serde_yaml::from_str("input: a\noutput: b").unwrap();
        assert_eq!(file.kind, FileKind::None);
    }

    #[test]
    fn test_config_to_yaml_contains_sections() {
        let config = Config {
            runs: vec![RunSpec::new("run_a").with_variable("num", vec![Scalar::Int(1)])],
            files: vec![FileDirective::new("file_par", "in.tmpl", "in.par")],
            ..Config::default()
        };
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("driver:"));
        assert!(yaml.contains("run_a:"));
        assert!(yaml.contains("file_par:"));
    }
}
