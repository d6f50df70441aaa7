//! Template Rendering
//!
//! Materialises a task's files from templates:
//!
//! - a template directory is copied recursively into the task directory;
//!   file names and UTF-8 file contents containing `%(` placeholders are
//!   substituted, everything else is copied byte for byte
//! - a file directive renders one template file, with its own `parameters`
//!   as the most specific scope, to an output path
//!
//! Placeholder failures propagate unchanged to the caller.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::config::model::FileDirective;
use crate::error::{Error, Result};
use crate::params::{absolute_from, DefaultFormats, ParameterStore, ScopeKind};

const PLACEHOLDER_START: &str = "%(";

/// Counts of what a directory render did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Files whose content went through substitution
    pub rendered: usize,
    /// Files (and symlinks) copied unchanged
    pub copied: usize,
    pub directories: usize,
}

/// Renders template trees and file directives for one configuration.
#[derive(Debug, Clone)]
pub struct Renderer {
    /// Anchor for relative template paths
    cwd: PathBuf,
    defaults: DefaultFormats,
}

impl Renderer {
    pub fn new(cwd: impl Into<PathBuf>, defaults: DefaultFormats) -> Self {
        Self {
            cwd: cwd.into(),
            defaults,
        }
    }

    /// Substitutes placeholders in file content, applying default formats.
    pub fn render_text(&self, text: &str, store: &ParameterStore) -> Result<String> {
        store.render(text, &self.defaults)
    }

    /// Copies the template tree at `source` into `destination`.
    ///
    /// Existing files in `destination` are overwritten.
    pub fn render_tree(
        &self,
        source: &Path,
        destination: &Path,
        store: &ParameterStore,
    ) -> Result<RenderSummary> {
        if !source.is_dir() {
            return Err(Error::TemplateNotFound(source.to_path_buf()));
        }
        if destination.starts_with(source) {
            return Err(Error::config(format!(
                "cannot render template {} into itself ({})",
                source.display(),
                destination.display()
            )));
        }

        debug!(
            "Rendering template {} -> {}",
            source.display(),
            destination.display()
        );

        let mut summary = RenderSummary::default();
        self.copy_dir(source, destination, store, &mut summary)?;
        Ok(summary)
    }

    fn copy_dir(
        &self,
        source: &Path,
        destination: &Path,
        store: &ParameterStore,
        summary: &mut RenderSummary,
    ) -> Result<()> {
        fs::create_dir_all(destination).map_err(|e| Error::io(destination, e))?;
        summary.directories += 1;

        let mut entries = fs::read_dir(source)
            .map_err(|e| Error::io(source, e))?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| Error::io(source, e))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let from = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let name = if name.contains(PLACEHOLDER_START) {
                store.substitute(&name)?
            } else {
                name
            };
            let to = destination.join(&name);

            let file_type = entry.file_type().map_err(|e| Error::io(&from, e))?;
            if file_type.is_symlink() {
                copy_symlink(&from, &to)?;
                summary.copied += 1;
            } else if file_type.is_dir() {
                self.copy_dir(&from, &to, store, summary)?;
            } else if self.copy_file(&from, &to, store)? {
                summary.rendered += 1;
            } else {
                summary.copied += 1;
            }
        }

        Ok(())
    }

    /// Copies one file; returns whether its content was substituted.
    fn copy_file(&self, from: &Path, to: &Path, store: &ParameterStore) -> Result<bool> {
        let bytes = fs::read(from).map_err(|e| Error::io(from, e))?;

        let text = match std::str::from_utf8(&bytes) {
            Ok(text) if text.contains(PLACEHOLDER_START) => text,
            _ => {
                trace!("Copying {}", from.display());
                fs::copy(from, to).map_err(|e| Error::io(to, e))?;
                return Ok(false);
            }
        };

        trace!("Rendering {}", from.display());
        let rendered = self.render_text(text, store)?;
        fs::write(to, rendered).map_err(|e| Error::io(to, e))?;

        let permissions = fs::metadata(from)
            .map_err(|e| Error::io(from, e))?
            .permissions();
        fs::set_permissions(to, permissions).map_err(|e| Error::io(to, e))?;
        Ok(true)
    }

    /// Absolute template path of a directive.
    pub fn input_path(&self, directive: &FileDirective, store: &ParameterStore) -> Result<PathBuf> {
        let raw = store.substitute(&directive.input)?;
        Ok(absolute_from(&self.cwd, &raw))
    }

    /// Absolute output path of a directive; relative outputs are anchored at
    /// `base`.
    pub fn output_path(
        &self,
        directive: &FileDirective,
        store: &ParameterStore,
        base: &Path,
    ) -> Result<PathBuf> {
        let raw = directive
            .output
            .as_deref()
            .ok_or_else(|| Error::config(format!("{}: no output path given", directive.name)))?;
        let raw = store.substitute(raw)?;
        Ok(absolute_from(base, &raw))
    }

    /// Renders a directive into `base` and returns the written path.
    pub fn render_file(
        &self,
        directive: &FileDirective,
        store: &ParameterStore,
        base: &Path,
    ) -> Result<PathBuf> {
        let output = self.output_path(directive, store, base)?;
        self.render_file_to(directive, store, &output)?;
        Ok(output)
    }

    /// Renders a directive to an explicit output path.
    pub fn render_file_to(
        &self,
        directive: &FileDirective,
        store: &ParameterStore,
        output: &Path,
    ) -> Result<()> {
        let store = store.extended(ScopeKind::File, directive.parameters.clone());
        let input = self.input_path(directive, &store)?;
        if !input.is_file() {
            return Err(Error::TemplateNotFound(input));
        }

        let template = fs::read_to_string(&input).map_err(|e| Error::io(&input, e))?;
        let rendered = self.render_text(&template, &store)?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(output, rendered).map_err(|e| Error::io(output, e))?;

        debug!(
            "{}: rendered {} -> {}",
            directive.name,
            input.display(),
            output.display()
        );
        Ok(())
    }
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from).map_err(|e| Error::io(from, e))?;
    if fs::symlink_metadata(to).is_ok() {
        fs::remove_file(to).map_err(|e| Error::io(to, e))?;
    }
    std::os::unix::fs::symlink(&target, to).map_err(|e| Error::io(to, e))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map_err(|e| Error::io(to, e))?;
    Ok(())
}
