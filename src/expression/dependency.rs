//! Parameter Dependencies
//!
//! Builds the graph of `%(name)` references between parameters and resolves
//! them in topological order (Kahn's algorithm), so a parameter is always
//! evaluated after everything it references. Undefined references and
//! reference cycles are reported before anything is evaluated.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;

use crate::config::value::Scalar;
use crate::error::{Error, Result};
use crate::params::{referenced_names, ParameterStore};

/// Reference graph over the parameters reachable from a set of roots.
#[derive(Debug, Default)]
struct Graph {
    /// name -> names it references
    dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl Graph {
    fn discover<'a>(store: &ParameterStore, roots: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut graph = Graph::default();
        let mut queue: VecDeque<String> = roots.into_iter().map(str::to_string).collect();

        while let Some(name) = queue.pop_front() {
            if graph.dependencies.contains_key(&name) {
                continue;
            }

            let value = store
                .lookup(&name)
                .ok_or_else(|| Error::UnknownParameter(name.clone()))?;

            let mut deps = BTreeSet::new();
            for reference in value.template_text().map(referenced_names).unwrap_or_default() {
                if !store.contains(reference) {
                    return Err(Error::UndefinedReference {
                        parameter: name.clone(),
                        reference: reference.to_string(),
                    });
                }
                if deps.insert(reference.to_string()) {
                    queue.push_back(reference.to_string());
                }
            }

            graph.dependencies.insert(name, deps);
        }

        Ok(graph)
    }

    /// Kahn's algorithm; the queue is kept sorted so the order is stable.
    fn topological_order(&self) -> Result<Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .dependencies
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.len()))
            .collect();

        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, deps) in &self.dependencies {
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(current) = ready.pop_first() {
            order.push(current.to_string());

            for dependent in dependents.get(current).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if order.len() != self.dependencies.len() {
            return Err(Error::CyclicExpression(self.cycle_members(&order).join(", ")));
        }

        Ok(order)
    }

    /// Names left after Kahn's algorithm that lie on a cycle, without the
    /// names that merely depend on one.
    fn cycle_members(&self, ordered: &[String]) -> Vec<String> {
        let mut remaining: BTreeSet<&str> = self
            .dependencies
            .keys()
            .map(String::as_str)
            .filter(|name| !ordered.iter().any(|o| o.as_str() == *name))
            .collect();

        loop {
            let downstream_only: Vec<&str> = remaining
                .iter()
                .copied()
                .filter(|name| {
                    !remaining.iter().any(|other| {
                        self.dependencies
                            .get(*other)
                            .is_some_and(|deps| deps.contains(*name))
                    })
                })
                .collect();

            if downstream_only.is_empty() {
                break;
            }
            for name in downstream_only {
                remaining.remove(name);
            }
        }

        remaining.into_iter().map(str::to_string).collect()
    }
}

/// Order in which `roots` and everything they reference must be resolved.
pub fn dependency_order<'a>(
    store: &ParameterStore,
    roots: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<String>> {
    Graph::discover(store, roots)?.topological_order()
}

/// Resolves every root parameter to a scalar, dependencies first.
///
/// Fails with [`Error::UndefinedReference`] when a parameter references a
/// name no scope defines and with [`Error::CyclicExpression`] when
/// parameters reference each other in a loop.
pub fn resolve_parameters<'a>(
    store: &ParameterStore,
    roots: impl IntoIterator<Item = &'a str>,
) -> Result<BTreeMap<String, Scalar>> {
    let roots: BTreeSet<&str> = roots.into_iter().collect();
    let order = dependency_order(store, roots.iter().copied())?;
    debug!("Resolution order: {:?}", order);

    let mut resolved = BTreeMap::new();
    for name in order {
        if roots.contains(name.as_str()) {
            let value = store.resolve(&name)?;
            resolved.insert(name, value);
        }
    }
    Ok(resolved)
}
