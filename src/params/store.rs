//! Parameter Store
//!
//! An ordered chain of parameter scopes, least specific first:
//!
//! ```text
//! static → runtime → userdef → run → assignment → file
//! ```
//!
//! Lookup walks the chain from the most specific scope down and the first
//! binding wins. Values are resolved on demand: `%(name)` and
//! `%(name:spec)` placeholders inside a value are substituted recursively
//! through the whole chain, and a value whose substituted text is wrapped
//! in backticks is evaluated as an expression.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::trace;

use super::context::StaticContext;
use super::format::{format_scalar, DefaultFormats};
use crate::config::value::{expression_body, ParamValue, Scalar};
use crate::error::{Error, Result};
use crate::expression;

/// Upper bound on textual substitution passes over one string.
pub const MAX_PASSES: usize = 10;

/// Origin of a scope in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeKind {
    /// Process context: `cwd`, `scriptdir`
    Static,
    /// Values known only while running: `thread`, `runname`, `taskdir`, ...
    Runtime,
    Userdef,
    Run,
    /// The task's variable assignment
    Assignment,
    /// Parameters of a single file directive
    File,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Static => "static",
            Self::Runtime => "runtime",
            Self::Userdef => "userdef",
            Self::Run => "run",
            Self::Assignment => "assignment",
            Self::File => "file",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Scope {
    kind: ScopeKind,
    bindings: BTreeMap<String, ParamValue>,
}

/// A `%(name)` or `%(name:spec)` token located in a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Byte offset of the leading `%`
    pub start: usize,
    /// Byte offset just past the closing `)`
    pub end: usize,
    pub name: &'a str,
    pub spec: Option<&'a str>,
}

/// Finds all well-formed placeholders in `text`, left to right.
///
/// Anything that merely looks like the start of a placeholder (`100%`,
/// `%(`, `%(a b)`) is left alone.
pub fn find_placeholders(text: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(offset) = text[from..].find("%(") {
        let start = from + offset;
        match parse_placeholder(text, start) {
            Some(placeholder) => {
                from = placeholder.end;
                found.push(placeholder);
            }
            None => from = start + 1,
        }
    }
    found
}

/// Names referenced by placeholders in `text`, in order of appearance.
pub fn referenced_names(text: &str) -> Vec<&str> {
    find_placeholders(text).into_iter().map(|p| p.name).collect()
}

fn parse_placeholder(text: &str, start: usize) -> Option<Placeholder<'_>> {
    let body_start = start + 2;
    let rest = &text[body_start..];
    let name_len = rest.find(|c: char| !is_name_char(c)).unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    let name = &rest[..name_len];
    let after = &rest[name_len..];

    if after.starts_with(')') {
        return Some(Placeholder {
            start,
            end: body_start + name_len + 1,
            name,
            spec: None,
        });
    }

    let spec_text = after.strip_prefix(':')?;
    let close = spec_text.find(|c: char| c == ')' || c == '(' || c == '\n')?;
    if close == 0 || !spec_text[close..].starts_with(')') {
        return None;
    }
    Some(Placeholder {
        start,
        end: body_start + name_len + 1 + close + 1,
        name,
        spec: Some(&spec_text[..close]),
    })
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Scoped parameter bindings with on-demand resolution.
///
/// A store is cheap to extend: [`ParameterStore::extended`] clones the chain
/// and pushes one more scope, so every task and every file directive gets a
/// private store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    scopes: Vec<Scope>,
}

impl ParameterStore {
    /// Creates a store holding only the static scope.
    pub fn new(context: &StaticContext) -> Self {
        Self::default().with_scope(ScopeKind::Static, context.bindings())
    }

    pub fn with_scope(mut self, kind: ScopeKind, bindings: BTreeMap<String, ParamValue>) -> Self {
        self.push_scope(kind, bindings);
        self
    }

    pub fn push_scope(&mut self, kind: ScopeKind, bindings: BTreeMap<String, ParamValue>) {
        trace!("Pushing {} scope with {} bindings", kind, bindings.len());
        self.scopes.push(Scope { kind, bindings });
    }

    /// Copy of this store with one more, more specific scope.
    pub fn extended(&self, kind: ScopeKind, bindings: BTreeMap<String, ParamValue>) -> Self {
        self.clone().with_scope(kind, bindings)
    }

    /// Raw value bound to `name` in the most specific scope defining it.
    pub fn lookup(&self, name: &str) -> Option<&ParamValue> {
        self.binding(name).map(|(_, value)| value)
    }

    fn binding(&self, name: &str) -> Option<(ScopeKind, &ParamValue)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.bindings.get(name).map(|value| (s.kind, value)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Every name bound in any scope.
    pub fn names(&self) -> BTreeSet<&str> {
        self.scopes
            .iter()
            .flat_map(|s| s.bindings.keys().map(String::as_str))
            .collect()
    }

    /// Fully resolves the parameter `name` to a scalar.
    pub fn resolve(&self, name: &str) -> Result<Scalar> {
        Resolver::new(self).resolve(name)
    }

    /// Replaces every placeholder in `text` by its resolved, formatted value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeMap;
    /// use chauffeur::config::ParamValue;
    /// use chauffeur::params::{ParameterStore, ScopeKind};
    ///
    /// let store = ParameterStore::default().with_scope(
    ///     ScopeKind::Assignment,
    ///     BTreeMap::from([("num".to_string(), ParamValue::from(7i64))]),
    /// );
    /// assert_eq!(store.substitute("run_%(num:03d)").unwrap(), "run_007");
    /// ```
    pub fn substitute(&self, text: &str) -> Result<String> {
        Resolver::new(self).substitute(text, None)
    }

    /// Like [`ParameterStore::substitute`], but placeholders without an
    /// inline spec take the default format for their value's type.
    pub fn render(&self, text: &str, defaults: &DefaultFormats) -> Result<String> {
        if defaults.is_empty() {
            return self.substitute(text);
        }
        Resolver::new(self).substitute(text, Some(defaults))
    }

    /// Substitutes placeholders in `expression` and evaluates the result,
    /// with or without enclosing backticks.
    pub fn evaluate(&self, expression: &str) -> Result<Scalar> {
        let text = self.substitute(expression)?;
        expression::evaluate(expression_body(&text).unwrap_or(&text))
    }
}

/// Tracks the chain of names being resolved to catch self references.
struct Resolver<'a> {
    store: &'a ParameterStore,
    stack: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(store: &'a ParameterStore) -> Self {
        Self {
            store,
            stack: Vec::new(),
        }
    }

    fn resolve(&mut self, name: &str) -> Result<Scalar> {
        if let Some(pos) = self.stack.iter().position(|n| n == name) {
            let mut chain = self.stack[pos..].to_vec();
            chain.push(name.to_string());
            return Err(Error::CyclicReference(chain.join(" -> ")));
        }

        let store = self.store;
        let (kind, value) = store
            .binding(name)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))?;
        trace!("Resolving {} from {} scope", name, kind);

        let text = match value {
            ParamValue::Scalar(Scalar::Str(s)) | ParamValue::Expression(s) => s,
            ParamValue::Scalar(other) => return Ok(other.clone()),
            ParamValue::Sequence(_) => return Ok(Scalar::Str(value.natural_text())),
        };

        self.stack.push(name.to_string());
        let substituted = self.substitute(text, None);
        self.stack.pop();

        let substituted = substituted?;
        match expression_body(&substituted) {
            Some(body) => expression::evaluate(body),
            None => Ok(Scalar::Str(substituted)),
        }
    }

    fn substitute(&mut self, text: &str, defaults: Option<&DefaultFormats>) -> Result<String> {
        let mut current = text.to_string();

        for _ in 0..MAX_PASSES {
            let found = find_placeholders(&current);
            if found.is_empty() {
                return Ok(current);
            }

            let mut out = String::with_capacity(current.len());
            let mut last = 0;
            for placeholder in &found {
                out.push_str(&current[last..placeholder.start]);
                last = placeholder.end;

                if !self.store.contains(placeholder.name) {
                    return Err(Error::UnresolvedReference {
                        name: placeholder.name.to_string(),
                        text: text.to_string(),
                    });
                }
                let value = self.resolve(placeholder.name)?;
                let spec = placeholder
                    .spec
                    .or_else(|| defaults.and_then(|d| d.spec_for(&value)));
                match spec {
                    Some(spec) => out.push_str(&format_scalar(spec, &value)?),
                    None => out.push_str(&value.to_string()),
                }
            }
            out.push_str(&current[last..]);
            current = out;
        }

        if find_placeholders(&current).is_empty() {
            Ok(current)
        } else {
            Err(Error::CyclicReference(format!(
                "\"{}\" still contains placeholders after {} substitution passes",
                text, MAX_PASSES
            )))
        }
    }
}
