//! YAML process description.
//!
//! ```yaml
//! process:
//!   name: "Event Display"
//!   max_events: 9999          # or "unbounded" / -1
//!   master_seed: 12345
//!   failure_policy: abort     # abort | fail_path | skip_event
//!   search_path: ["."]
//! services:
//!   - label: Geometry
//!     params:
//!       GDML: { file_in_path: "Geometry/gdml/ndos.gdml" }
//! source:
//!   label: source
//!   plugin: EmptyEvent
//!   params: { numberEvents: { int32: 3 } }
//! producers:
//!   - label: singlegen
//!     plugin: SingleGen
//!     params: { PDG: { vint32: [13] } }
//! end_paths:
//!   - name: doit
//!     modules: [singlegen]
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::process::{FailurePolicy, MaxEvents, ProcessBuilder};
use crate::pset::ParameterSet;
use crate::registry::ComponentKind;

/// A whole process description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    pub process: ProcessSection,
    #[serde(default)]
    pub services: Vec<ComponentConfig>,
    /// Missing here is reported as `NoSource` when the process starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ComponentConfig>,
    #[serde(default)]
    pub producers: Vec<ComponentConfig>,
    #[serde(default)]
    pub outputs: Vec<ComponentConfig>,
    #[serde(default)]
    pub paths: Vec<PathConfig>,
    #[serde(default)]
    pub end_paths: Vec<PathConfig>,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSection {
    pub name: String,
    #[serde(default)]
    pub max_events: MaxEventsSetting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_seed: Option<u64>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub search_path: Vec<PathBuf>,
}

/// `max_events` as written: a count, `-1`, or `"unbounded"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxEventsSetting {
    Count(i64),
    Keyword(String),
}

impl Default for MaxEventsSetting {
    fn default() -> Self {
        MaxEventsSetting::Count(-1)
    }
}

impl MaxEventsSetting {
    pub fn resolve(&self) -> Result<MaxEvents, ConfigError> {
        match self {
            MaxEventsSetting::Count(n) => MaxEvents::from_i64(*n),
            MaxEventsSetting::Keyword(s) => MaxEvents::parse(s),
        }
    }
}

/// One declared component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentConfig {
    pub label: String,
    /// Defaults to the label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(default)]
    pub params: ParameterSet,
}

impl ComponentConfig {
    pub fn plugin(&self) -> &str {
        self.plugin.as_deref().unwrap_or(&self.label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathConfig {
    pub name: String,
    #[serde(default)]
    pub modules: Vec<String>,
}

/// Problems found in a description before any component is declared.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid process configuration: {0}")]
    InvalidProcess(String),
    #[error("Invalid component configuration: {0}")]
    InvalidComponent(String),
    #[error("Invalid path configuration: {0}")]
    InvalidPath(String),
}

impl ProcessConfig {
    /// Structural checks. Label rules, duplicates and path references are
    /// checked when the description is turned into a builder.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.process.name.trim().is_empty() {
            return Err(ValidationError::InvalidProcess(
                "name cannot be empty".to_string(),
            ));
        }
        self.process
            .max_events
            .resolve()
            .map_err(|e| ValidationError::InvalidProcess(e.to_string()))?;

        for component in self.components() {
            if component.plugin().trim().is_empty() {
                return Err(ValidationError::InvalidComponent(format!(
                    "plugin of '{}' cannot be empty",
                    component.label
                )));
            }
        }

        for path in self.paths.iter().chain(&self.end_paths) {
            if path.modules.iter().any(|m| m.trim().is_empty()) {
                return Err(ValidationError::InvalidPath(format!(
                    "path '{}' contains an empty module label",
                    path.name
                )));
            }
        }
        Ok(())
    }

    fn components(&self) -> impl Iterator<Item = &ComponentConfig> {
        self.services
            .iter()
            .chain(self.source.iter())
            .chain(&self.producers)
            .chain(&self.outputs)
    }

    /// Declare everything in a fresh [`ProcessBuilder`]: services, source,
    /// producers, outputs, then paths and end paths.
    pub fn to_builder(&self) -> Result<ProcessBuilder, ConfigError> {
        let mut builder = ProcessBuilder::new(&self.process.name);
        builder
            .max_events(self.process.max_events.resolve()?)
            .failure_policy(self.process.failure_policy);
        if let Some(seed) = self.process.master_seed {
            builder.master_seed(seed);
        }
        for dir in &self.process.search_path {
            builder.search_dir(dir.clone());
        }

        let declare = |builder: &mut ProcessBuilder, c: &ComponentConfig, kind| {
            builder
                .declare(&c.label, kind, c.plugin(), c.params.clone())
                .map(|_| ())
        };
        for c in &self.services {
            declare(&mut builder, c, ComponentKind::Service)?;
        }
        if let Some(c) = &self.source {
            declare(&mut builder, c, ComponentKind::Source)?;
        }
        for c in &self.producers {
            declare(&mut builder, c, ComponentKind::Producer)?;
        }
        for c in &self.outputs {
            declare(&mut builder, c, ComponentKind::OutputModule)?;
        }

        for path in &self.paths {
            builder.path(&path.name, &path.modules)?;
        }
        for path in &self.end_paths {
            builder.end_path(&path.name, &path.modules)?;
        }
        Ok(builder)
    }
}
