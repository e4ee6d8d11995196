//! # Paths and end paths
//!
//! A path is an ordered list of module labels executed once per event.
//! A path short-circuits when a module returns [`ModuleOutcome::Stop`] or
//! [`ModuleOutcome::Fail`]. End paths follow the same rule but run after
//! every ordinary path of the event, whatever those paths did. Output
//! modules may only be scheduled on end paths.
//!
//! The schedule only stores validated labels. Executing it (including the
//! per-event memoization of modules shared between paths) is the process
//! engine's job.

use log::debug;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::error::ConfigError;
use crate::registry::{ComponentKind, ComponentRegistry};
use crate::utils::labels::is_valid_label;

/// Result of running one module on one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleOutcome {
    /// Keep going along the path.
    Continue,
    /// Reject: stop this path without error.
    Stop,
    /// The module could not do its job for this event.
    Fail,
}

impl ModuleOutcome {
    /// Whether the path should move on to its next module.
    pub fn proceeds(&self) -> bool {
        matches!(self, ModuleOutcome::Continue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PathKind {
    Path,
    EndPath,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKind::Path => write!(f, "path"),
            PathKind::EndPath => write!(f, "end path"),
        }
    }
}

/// A validated, named sequence of module labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub name: String,
    pub kind: PathKind,
    pub modules: Vec<String>,
}

/// All paths and end paths of a process, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    paths: Vec<Path>,
    end_paths: Vec<Path>,
}

impl Schedule {
    pub fn new() -> Self {
        Schedule::default()
    }

    /// Declare an ordinary path.
    pub fn build_path<S: AsRef<str>>(
        &mut self,
        registry: &ComponentRegistry,
        name: &str,
        modules: &[S],
    ) -> Result<(), ConfigError> {
        let path = self.validate(registry, name, PathKind::Path, modules)?;
        self.paths.push(path);
        Ok(())
    }

    /// Declare an end path.
    pub fn build_end_path<S: AsRef<str>>(
        &mut self,
        registry: &ComponentRegistry,
        name: &str,
        modules: &[S],
    ) -> Result<(), ConfigError> {
        let path = self.validate(registry, name, PathKind::EndPath, modules)?;
        self.end_paths.push(path);
        Ok(())
    }

    fn validate<S: AsRef<str>>(
        &self,
        registry: &ComponentRegistry,
        name: &str,
        kind: PathKind,
        modules: &[S],
    ) -> Result<Path, ConfigError> {
        if !is_valid_label(name) {
            return Err(ConfigError::InvalidLabel {
                label: name.to_string(),
            });
        }
        if self.iter().any(|p| p.name == name) {
            return Err(ConfigError::DuplicatePath {
                name: name.to_string(),
            });
        }

        let mut labels = Vec::with_capacity(modules.len());
        for module in modules {
            let decl = registry.lookup(module.as_ref())?;
            if !decl.kind.is_schedulable() {
                return Err(ConfigError::InvalidModuleInPath {
                    path: name.to_string(),
                    label: decl.label.clone(),
                    kind: decl.kind,
                });
            }
            if kind == PathKind::Path && decl.kind == ComponentKind::OutputModule {
                return Err(ConfigError::OutputOnPath {
                    path: name.to_string(),
                    label: decl.label.clone(),
                });
            }
            labels.push(decl.label.clone());
        }

        debug!("Declared {} '{}': [{}]", kind, name, labels.join(", "));
        Ok(Path {
            name: name.to_string(),
            kind,
            modules: labels,
        })
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn end_paths(&self) -> &[Path] {
        &self.end_paths
    }

    /// Paths followed by end paths, i.e. per-event execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().chain(self.end_paths.iter())
    }

    /// Every scheduled module once, in order of first reference.
    pub fn active_modules(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut modules = Vec::new();
        for path in self.iter() {
            for module in &path.modules {
                if seen.insert(module.as_str()) {
                    modules.push(module.clone());
                }
            }
        }
        modules
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.end_paths.is_empty()
    }
}
