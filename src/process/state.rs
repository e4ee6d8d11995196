//! Process lifecycle states.

use serde::Serialize;
use std::fmt;

/// Lifecycle of one process run.
///
/// ```text
/// Configured -> Initialized -> Running -> Draining -> Finished
///      \              \            \          \
///       `--------------`------------`----------`--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessState {
    Configured,
    Initialized,
    Running,
    Draining,
    Finished,
    Failed,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Finished | ProcessState::Failed)
    }

    pub fn can_transition_to(&self, next: ProcessState) -> bool {
        use ProcessState::*;
        match (self, next) {
            (Configured, Initialized)
            | (Initialized, Running)
            | (Running, Draining)
            | (Draining, Finished) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Configured => "Configured",
            ProcessState::Initialized => "Initialized",
            ProcessState::Running => "Running",
            ProcessState::Draining => "Draining",
            ProcessState::Finished => "Finished",
            ProcessState::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}
