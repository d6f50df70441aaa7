//! Task Generator
//!
//! Enumerates the cartesian product of a run's variable lists lazily. The
//! product is walked as a mixed-radix counter: the first variable of the
//! enumeration order is the lowest digit and varies fastest, so
//!
//! ```text
//! variableorder: [a, b]     a: [4, 5]     b: [1, 2]
//!
//! #0 a=4 b=1   #1 a=5 b=1   #2 a=4 b=2   #3 a=5 b=2
//! ```
//!
//! Any task can be rebuilt from its index alone, so repeated generation
//! always yields the same index → assignment mapping.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::model::Task;
use crate::config::model::RunSpec;
use crate::config::value::Scalar;
use crate::error::{Error, Result};

/// Enumeration order of a run's variables, fastest-varying first.
///
/// Without an explicit `variableorder` the variable names are taken in
/// lexicographic order.
pub fn resolve_variable_order(run: &RunSpec) -> Result<Vec<String>> {
    let variables: Vec<String> = run.variables.keys().cloned().collect();

    let Some(order) = &run.variableorder else {
        return Ok(variables);
    };

    let given: BTreeSet<&str> = order.iter().map(String::as_str).collect();
    let expected: BTreeSet<&str> = variables.iter().map(String::as_str).collect();

    if given.len() != order.len() || given != expected {
        return Err(Error::InvalidVariableOrder {
            run: run.name.clone(),
            order: order.clone(),
            variables,
        });
    }

    Ok(order.clone())
}

/// Lazy iterator over the tasks of one run.
#[derive(Debug, Clone)]
pub struct TaskGenerator {
    run: String,
    /// Variable names, fastest-varying first
    order: Vec<String>,
    /// Values of each variable, aligned with `order`
    values: Vec<Vec<Scalar>>,
    total: usize,
    next: usize,
}

impl TaskGenerator {
    /// Validates the run's variable order and prepares the enumeration.
    pub fn new(run: &RunSpec) -> Result<Self> {
        if run.variables.is_empty() {
            return Err(Error::config(format!("{}: no variables defined", run.name)));
        }
        let order = resolve_variable_order(run)?;

        let values: Vec<Vec<Scalar>> = order
            .iter()
            .map(|name| run.variables.get(name).cloned().unwrap_or_default())
            .collect();

        let total = values
            .iter()
            .try_fold(1usize, |acc, v| acc.checked_mul(v.len()))
            .ok_or_else(|| {
                Error::config(format!(
                    "{}: parameter space is too large to enumerate",
                    run.name
                ))
            })?;

        debug!(
            "{}: {} tasks over {:?} (fastest first)",
            run.name, total, order
        );

        Ok(Self {
            run: run.name.clone(),
            order,
            values,
            total,
            next: 0,
        })
    }

    /// Number of tasks in the run.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Variable names, fastest-varying first.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Builds the task at `index` without enumerating its predecessors.
    pub fn task_at(&self, index: usize) -> Option<Task> {
        if index >= self.total {
            return None;
        }

        let mut rest = index;
        let mut assignment = BTreeMap::new();
        for (name, values) in self.order.iter().zip(&self.values) {
            let digit = rest % values.len();
            rest /= values.len();
            assignment.insert(name.clone(), values[digit].clone());
        }

        Some(Task {
            run: self.run.clone(),
            index,
            assignment,
        })
    }
}

impl Iterator for TaskGenerator {
    type Item = Task;

    fn next(&mut self) -> Option<Task> {
        let task = self.task_at(self.next)?;
        self.next += 1;
        Some(task)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for TaskGenerator {}
