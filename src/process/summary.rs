//! End-of-run report.
//!
//! The summary is filled in while events are processed and logged once the
//! run is over, in the spirit of a trigger report: one line per path and
//! one per module.

use chrono::{DateTime, Utc};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::pset::ParameterSetId;
use crate::registry::ComponentKind;
use crate::schedule::{ModuleOutcome, PathKind};

use super::state::ProcessState;

/// Counters for one path or end path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathSummary {
    pub name: String,
    pub kind: PathKind,
    pub run: u64,
    pub passed: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl PathSummary {
    pub fn new(name: &str, kind: PathKind) -> Self {
        PathSummary {
            name: name.to_string(),
            kind,
            run: 0,
            passed: 0,
            rejected: 0,
            failed: 0,
        }
    }
}

/// Counters for one scheduled module.
///
/// `visited` counts every time a path reached the module; `executed`
/// counts actual invocations, which stays at one per event however many
/// paths share the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    pub label: String,
    pub kind: ComponentKind,
    pub plugin: String,
    pub pset_id: ParameterSetId,
    pub visited: u64,
    pub executed: u64,
    pub passed: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl ModuleSummary {
    pub fn new(label: &str, kind: ComponentKind, plugin: &str, pset_id: ParameterSetId) -> Self {
        ModuleSummary {
            label: label.to_string(),
            kind,
            plugin: plugin.to_string(),
            pset_id,
            visited: 0,
            executed: 0,
            passed: 0,
            rejected: 0,
            failed: 0,
        }
    }

    pub(crate) fn record(&mut self, outcome: ModuleOutcome) {
        self.executed += 1;
        match outcome {
            ModuleOutcome::Continue => self.passed += 1,
            ModuleOutcome::Stop => self.rejected += 1,
            ModuleOutcome::Fail => self.failed += 1,
        }
    }
}

/// Everything reported about one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub process_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub events_read: u64,
    pub events_processed: u64,
    pub events_skipped: u64,
    pub final_state: ProcessState,
    pub history: Vec<ProcessState>,
    /// Message of the error that ended the run, if any.
    pub error: Option<String>,
    pub paths: Vec<PathSummary>,
    pub modules: Vec<ModuleSummary>,
}

impl RunSummary {
    pub fn new(process_name: &str) -> Self {
        RunSummary {
            process_name: process_name.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            events_read: 0,
            events_processed: 0,
            events_skipped: 0,
            final_state: ProcessState::Configured,
            history: vec![ProcessState::Configured],
            error: None,
            paths: Vec::new(),
            modules: Vec::new(),
        }
    }

    pub fn path(&self, name: &str) -> Option<&PathSummary> {
        self.paths.iter().find(|p| p.name == name)
    }

    pub fn module(&self, label: &str) -> Option<&ModuleSummary> {
        self.modules.iter().find(|m| m.label == label)
    }

    pub fn succeeded(&self) -> bool {
        self.final_state == ProcessState::Finished
    }

    /// Write the summary as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).wrap_err("Failed to serialize run summary")?;
        fs::write(path, json)
            .wrap_err_with(|| format!("Failed to write run summary to {}", path.display()))?;
        info!("Run summary written to {}", path.display());
        Ok(())
    }

    /// Log the report through `log::info!`.
    pub fn log_report(&self) {
        info!("=== Run summary: {} ===", self.process_name);
        info!(
            "Events read: {}  processed: {}  skipped: {}",
            self.events_read, self.events_processed, self.events_skipped
        );
        let history: Vec<String> = self.history.iter().map(|s| s.to_string()).collect();
        info!("State: {} ({})", self.final_state, history.join(" -> "));
        if let Some(error) = &self.error {
            info!("Error: {}", error);
        }

        if !self.paths.is_empty() {
            info!("{:<8} {:<20} {:>8} {:>8} {:>8} {:>8}", "Kind", "Path", "Run", "Passed", "Rejected", "Failed");
            for p in &self.paths {
                let kind = match p.kind {
                    PathKind::Path => "path",
                    PathKind::EndPath => "endpath",
                };
                info!(
                    "{:<8} {:<20} {:>8} {:>8} {:>8} {:>8}",
                    kind, p.name, p.run, p.passed, p.rejected, p.failed
                );
            }
        }

        if !self.modules.is_empty() {
            info!(
                "{:<20} {:>8} {:>8} {:>8} {:>8} {:>8}  {}",
                "Module", "Visited", "Run", "Passed", "Rejected", "Failed", "PSet"
            );
            for m in &self.modules {
                info!(
                    "{:<20} {:>8} {:>8} {:>8} {:>8} {:>8}  {}",
                    m.label, m.visited, m.executed, m.passed, m.rejected, m.failed, m.pset_id
                );
            }
        }

        if let Some(end) = self.finished_at {
            let elapsed = end - self.started_at;
            info!("Wall time: {} ms", elapsed.num_milliseconds());
        }
    }
}
