//! Error taxonomy for configuring and running a process.
//!
//! Configuration problems are detected before any event is read and are
//! reported as [`ConfigError`]. Everything that goes wrong once components
//! exist is a [`FrameworkError`], which keeps the failing component's label
//! and the underlying cause as its `source()` so the whole chain can be
//! printed by the binary.

use crate::pset::ParameterError;
use crate::process::{EventId, ProcessState};
use crate::random::RandomError;
use crate::registry::ComponentKind;

/// Boxed cause attached to component failures.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors detected while building a process description.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid parameters for '{component}'")]
    Parameter {
        component: String,
        #[source]
        source: ParameterError,
    },

    #[error("label '{label}' is already declared as a {existing}")]
    DuplicateName { label: String, existing: ComponentKind },

    #[error("unknown component '{label}'")]
    UnknownComponent { label: String },

    #[error("no source declared")]
    NoSource,

    #[error("cannot declare source '{requested}': source '{existing}' is already declared")]
    DuplicateSource { existing: String, requested: String },

    #[error("path '{path}' references {kind} '{label}'; only producers and output modules can be scheduled")]
    InvalidModuleInPath {
        path: String,
        label: String,
        kind: ComponentKind,
    },

    #[error("path '{path}' references output module '{label}'; output modules belong on end paths")]
    OutputOnPath { path: String, label: String },

    #[error("path '{name}' is already declared")]
    DuplicatePath { name: String },

    #[error("invalid label '{label}': labels start with a letter and contain only letters, digits and '_'")]
    InvalidLabel { label: String },

    #[error("service '{name}' is not declared")]
    ServiceNotFound { name: String },

    #[error("invalid maxEvents value '{value}': expected a count >= 0, -1 or \"unbounded\"")]
    InvalidMaxEvents { value: String },
}

/// Errors raised while initializing, running or tearing down a process.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error("configuration error")]
    Configuration(#[from] ConfigError),

    #[error("failed to initialize component '{label}'")]
    ComponentInit {
        label: String,
        #[source]
        source: BoxedCause,
    },

    #[error("module '{label}' failed while processing event {event}")]
    ModuleExecution {
        label: String,
        event: EventId,
        #[source]
        source: BoxedCause,
    },

    #[error("source '{label}' failed to read the next event")]
    SourceRead {
        label: String,
        #[source]
        source: BoxedCause,
    },

    #[error("end-of-run notification failed for '{label}'")]
    Teardown {
        label: String,
        #[source]
        source: BoxedCause,
    },

    #[error("invalid process state transition {from} -> {to}")]
    InvalidTransition { from: ProcessState, to: ProcessState },

    #[error("random number state error")]
    Random(#[from] RandomError),
}

impl FrameworkError {
    /// Label of the component the error is attributed to, if any.
    pub fn component(&self) -> Option<&str> {
        match self {
            FrameworkError::ComponentInit { label, .. }
            | FrameworkError::ModuleExecution { label, .. }
            | FrameworkError::SourceRead { label, .. }
            | FrameworkError::Teardown { label, .. } => Some(label),
            FrameworkError::Configuration(ConfigError::Parameter { component, .. }) => {
                Some(component)
            }
            _ => None,
        }
    }
}

/// Convenience alias for `Result<T, FrameworkError>`.
pub type FrameworkResult<T> = Result<T, FrameworkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error_display() {
        let e = ConfigError::UnknownComponent {
            label: "ghost".into(),
        };
        assert_eq!(e.to_string(), "unknown component 'ghost'");

        let e = ConfigError::DuplicateSource {
            existing: "s1".into(),
            requested: "s2".into(),
        };
        assert!(e.to_string().contains("s1"));
        assert!(e.to_string().contains("s2"));
    }

    #[test]
    fn test_parameter_error_is_source() {
        let e = ConfigError::Parameter {
            component: "singlegen".into(),
            source: ParameterError::MissingKey { key: "PDG".into() },
        };
        assert!(e.to_string().contains("singlegen"));
        let source = e.source().unwrap();
        assert!(source.to_string().contains("PDG"));
    }

    #[test]
    fn test_cause_chain_is_preserved() {
        let cause: BoxedCause = Box::new(ParameterError::FileNotFound {
            file: "ndos.gdml".into(),
            searched: "/tmp".into(),
        });
        let e = FrameworkError::ComponentInit {
            label: "Geometry".into(),
            source: cause,
        };
        assert_eq!(e.component(), Some("Geometry"));
        assert!(e.source().unwrap().to_string().contains("ndos.gdml"));
    }

    #[test]
    fn test_config_error_converts() {
        let e: FrameworkError = ConfigError::NoSource.into();
        assert!(matches!(e, FrameworkError::Configuration(ConfigError::NoSource)));
        assert_eq!(e.component(), None);
    }
}
