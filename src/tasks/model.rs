//! Task Model
//!
//! One concrete point of a run's parameter space.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::value::{ParamValue, Scalar};

/// A variable assignment produced by the task generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// Run section the task belongs to
    pub run: String,
    /// Zero-based position in the run's enumeration order
    pub index: usize,
    /// Variable name -> value for this point
    pub assignment: BTreeMap<String, Scalar>,
}

impl Task {
    /// Short identifier used in logs and the timeline, e.g. `run_a#3`.
    pub fn label(&self) -> String {
        format!("{}#{}", self.run, self.index)
    }

    /// The assignment as parameter bindings for the assignment scope.
    pub fn bindings(&self) -> BTreeMap<String, ParamValue> {
        self.assignment
            .iter()
            .map(|(name, value)| (name.clone(), ParamValue::Scalar(value.clone())))
            .collect()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.label())?;
        for (i, (name, value)) in self.assignment.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, ")")
    }
}
