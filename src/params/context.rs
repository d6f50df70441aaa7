//! Static Context
//!
//! Process-wide, read-only values every parameter store starts from: the
//! invocation directory (`cwd`) and the directory the engine is installed
//! in (`scriptdir`). The context is captured once and passed explicitly to
//! everything that needs it.

use std::collections::BTreeMap;
use std::env;
use std::path::{Component, Path, PathBuf};

use crate::config::{ParamValue, Scalar};
use crate::error::{Error, Result};

/// Name under which the invocation directory is exposed.
pub const CWD: &str = "cwd";

/// Name under which the engine's installation directory is exposed.
pub const SCRIPTDIR: &str = "scriptdir";

/// Immutable process context threaded into every parameter store.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticContext {
    cwd: PathBuf,
    scriptdir: PathBuf,
}

impl StaticContext {
    pub fn new(cwd: impl Into<PathBuf>, scriptdir: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            scriptdir: scriptdir.into(),
        }
    }

    /// Captures the current directory and the running executable's directory.
    pub fn detect() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| Error::io(".", e))?;
        let exe = env::current_exe().map_err(|e| Error::io("<current executable>", e))?;
        let exe = exe.canonicalize().unwrap_or(exe);
        let scriptdir = exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        Ok(Self::new(cwd, scriptdir))
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Parameter bindings of the static scope.
    pub fn bindings(&self) -> BTreeMap<String, ParamValue> {
        BTreeMap::from([
            (CWD.to_string(), path_value(&self.cwd)),
            (SCRIPTDIR.to_string(), path_value(&self.scriptdir)),
        ])
    }

    /// Turns a user-supplied path into a normalised absolute path, expanding
    /// `~` and anchoring relative paths at the invocation directory.
    pub fn absolute_path(&self, raw: &str) -> PathBuf {
        absolute_from(&self.cwd, raw)
    }
}

/// Like [`StaticContext::absolute_path`] with an explicit base directory.
pub fn absolute_from(base: &Path, raw: &str) -> PathBuf {
    let expanded = expand_home(raw.trim());
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };
    normalize(&joined)
}

fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" || raw.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(raw.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(raw)
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn path_value(path: &Path) -> ParamValue {
    ParamValue::Scalar(Scalar::Str(path.to_string_lossy().into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> StaticContext {
        StaticContext::new("/work/sweep", "/opt/chauffeur/bin")
    }

    #[test]
    fn test_bindings() {
        let bindings = context().bindings();
        assert_eq!(bindings[CWD].natural_text(), "/work/sweep");
        assert_eq!(bindings[SCRIPTDIR].natural_text(), "/opt/chauffeur/bin");
    }

    #[test]
    fn test_relative_path_anchored_at_cwd() {
        assert_eq!(
            context().absolute_path("runs/num_1"),
            PathBuf::from("/work/sweep/runs/num_1")
        );
    }

    #[test]
    fn test_absolute_path_normalized() {
        assert_eq!(
            context().absolute_path("/data/./a/../b"),
            PathBuf::from("/data/b")
        );
        assert_eq!(
            context().absolute_path("../other"),
            PathBuf::from("/work/other")
        );
    }

    #[test]
    fn test_home_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(context().absolute_path("~/runs"), normalize(&home.join("runs")));
        }
    }

    #[test]
    fn test_detect_uses_current_dir() {
        let ctx = StaticContext::detect().unwrap();
        assert_eq!(ctx.cwd(), env::current_dir().unwrap().as_path());
        assert!(ctx.bindings().contains_key(SCRIPTDIR));
    }
}
