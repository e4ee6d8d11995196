//! # Component registry
//!
//! Holds every component declared in a process description: services,
//! the (single) source, producers and output modules. Each entry binds a
//! label to a kind, a plugin name that selects the implementation, and the
//! component's own [`ParameterSet`].
//!
//! Declarations are kept in order. Services are instantiated in that
//! order, and the order is also what the run summary reports.
//!
//! ```text
//! Geometry   Service        Geometry      <GDML=FileInPath(...);...>
//! source     Source         EmptyEvent    <...>
//! singlegen  Producer       SingleGen     <PDG=vint32({13});...>
//! ```

use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::error::ConfigError;
use crate::pset::ParameterSet;
use crate::utils::labels::is_valid_label;

/// The closed set of component roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComponentKind {
    Service,
    Source,
    Producer,
    OutputModule,
}

impl ComponentKind {
    /// Only producers and output modules may appear on paths.
    pub fn is_schedulable(&self) -> bool {
        matches!(self, ComponentKind::Producer | ComponentKind::OutputModule)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Service => "service",
            ComponentKind::Source => "source",
            ComponentKind::Producer => "producer",
            ComponentKind::OutputModule => "output module",
        };
        write!(f, "{}", name)
    }
}

/// A declared component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDecl {
    pub label: String,
    pub kind: ComponentKind,
    /// Implementation name resolved by the component factory.
    pub plugin: String,
    pub params: ParameterSet,
}

/// Registry of declared components, indexed by label.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: Vec<ComponentDecl>,
    index: HashMap<String, usize>,
    source: Option<usize>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        ComponentRegistry::default()
    }

    /// Declare a component.
    ///
    /// Labels are unique across all kinds, and at most one source may be
    /// declared.
    pub fn declare(
        &mut self,
        label: &str,
        kind: ComponentKind,
        plugin: &str,
        params: ParameterSet,
    ) -> Result<(), ConfigError> {
        if !is_valid_label(label) {
            return Err(ConfigError::InvalidLabel {
                label: label.to_string(),
            });
        }

        if let Some(&existing) = self.index.get(label) {
            return Err(ConfigError::DuplicateName {
                label: label.to_string(),
                existing: self.components[existing].kind,
            });
        }

        if kind == ComponentKind::Source {
            if let Some(existing) = self.source {
                return Err(ConfigError::DuplicateSource {
                    existing: self.components[existing].label.clone(),
                    requested: label.to_string(),
                });
            }
            self.source = Some(self.components.len());
        }

        debug!("Declared {} '{}' (plugin {})", kind, label, plugin);
        self.index.insert(label.to_string(), self.components.len());
        self.components.push(ComponentDecl {
            label: label.to_string(),
            kind,
            plugin: plugin.to_string(),
            params,
        });
        Ok(())
    }

    pub fn lookup(&self, label: &str) -> Result<&ComponentDecl, ConfigError> {
        self.index
            .get(label)
            .map(|&i| &self.components[i])
            .ok_or_else(|| ConfigError::UnknownComponent {
                label: label.to_string(),
            })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// The declared source, or [`ConfigError::NoSource`].
    pub fn source(&self) -> Result<&ComponentDecl, ConfigError> {
        self.source
            .map(|i| &self.components[i])
            .ok_or(ConfigError::NoSource)
    }

    /// Services in declaration order.
    pub fn services(&self) -> impl Iterator<Item = &ComponentDecl> {
        self.of_kind(ComponentKind::Service)
    }

    pub fn of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &ComponentDecl> {
        self.components.iter().filter(move |c| c.kind == kind)
    }

    /// All components in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDecl> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
