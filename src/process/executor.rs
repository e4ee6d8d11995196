//! Per-event execution of the schedule.
//!
//! Paths run in declaration order, then end paths. A module shared by
//! several paths runs once per event; later paths reuse its outcome.

use color_eyre::Report;
use log::{debug, warn};
use std::collections::HashMap;

use crate::error::{ConfigError, FrameworkError, FrameworkResult};
use crate::random::RandomNumberManager;
use crate::schedule::{ModuleOutcome, PathKind, Schedule};

use super::component::{ModuleContext, OutputModule, Producer, ServiceTable};
use super::event::Event;
use super::summary::{PathSummary, RunSummary};
use super::FailurePolicy;

/// Source attached to a `ModuleExecution` error when a module reported
/// [`ModuleOutcome::Fail`] instead of returning an error.
#[derive(Debug, thiserror::Error)]
#[error("module returned a Fail outcome")]
pub struct FailOutcome;

pub(crate) enum Worker {
    Producer(Box<dyn Producer>),
    Output(Box<dyn OutputModule>),
}

struct ScheduledModule {
    label: String,
    worker: Worker,
}

struct ResolvedPath {
    name: String,
    kind: PathKind,
    modules: Vec<usize>,
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventDisposition {
    Processed,
    Skipped,
}

enum PathStatus {
    Passed,
    Rejected,
    Failed,
}

#[derive(Default)]
pub(crate) struct Executor {
    modules: Vec<ScheduledModule>,
    index: HashMap<String, usize>,
    paths: Vec<ResolvedPath>,
    sequence: u64,
}

impl Executor {
    pub(crate) fn new() -> Self {
        Executor::default()
    }

    /// Add an instantiated module. Modules are torn down in reverse order
    /// of addition.
    pub(crate) fn add(&mut self, label: &str, worker: Worker) {
        self.index.insert(label.to_string(), self.modules.len());
        self.modules.push(ScheduledModule {
            label: label.to_string(),
            worker,
        });
    }

    /// Resolve every path of `schedule` against the added modules.
    pub(crate) fn bind(&mut self, schedule: &Schedule) -> Result<Vec<PathSummary>, ConfigError> {
        let mut summaries = Vec::new();
        for path in schedule.iter() {
            let modules = path
                .modules
                .iter()
                .map(|label| {
                    self.index
                        .get(label)
                        .copied()
                        .ok_or_else(|| ConfigError::UnknownComponent {
                            label: label.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            self.paths.push(ResolvedPath {
                name: path.name.clone(),
                kind: path.kind,
                modules,
            });
            summaries.push(PathSummary::new(&path.name, path.kind));
        }
        Ok(summaries)
    }

    pub(crate) fn len(&self) -> usize {
        self.modules.len()
    }

    /// Notify every module that the run starts, in order of addition.
    pub(crate) fn begin_run(
        &mut self,
        random: &mut RandomNumberManager,
        services: &ServiceTable,
    ) -> FrameworkResult<()> {
        let sequence = self.sequence;
        for module in &mut self.modules {
            let ScheduledModule { label, worker } = module;
            let mut ctx = ModuleContext::new(label.as_str(), random, services, sequence);
            let result = match worker {
                Worker::Producer(p) => p.begin_run(&mut ctx),
                Worker::Output(o) => o.begin_run(&mut ctx),
            };
            result.map_err(|e| FrameworkError::ComponentInit {
                label: label.clone(),
                source: e.into(),
            })?;
        }
        Ok(())
    }

    fn invoke(
        &mut self,
        idx: usize,
        event: &mut Event,
        random: &mut RandomNumberManager,
        services: &ServiceTable,
    ) -> Result<ModuleOutcome, Report> {
        self.sequence += 1;
        let ScheduledModule { label, worker } = &mut self.modules[idx];
        let mut ctx = ModuleContext::new(label.as_str(), random, services, self.sequence);
        match worker {
            Worker::Producer(p) => p.produce(event, &mut ctx),
            Worker::Output(o) => o.write(event, &mut ctx),
        }
    }

    /// Run all paths, then all end paths, on `event`.
    pub(crate) fn process_event(
        &mut self,
        event: &mut Event,
        policy: FailurePolicy,
        random: &mut RandomNumberManager,
        services: &ServiceTable,
        summary: &mut RunSummary,
    ) -> FrameworkResult<EventDisposition> {
        let mut memo: HashMap<usize, ModuleOutcome> = HashMap::new();

        for path_idx in 0..self.paths.len() {
            summary.paths[path_idx].run += 1;
            let mut status = PathStatus::Passed;

            for step in 0..self.paths[path_idx].modules.len() {
                let idx = self.paths[path_idx].modules[step];
                summary.modules[idx].visited += 1;

                let outcome = match memo.get(&idx) {
                    Some(outcome) => *outcome,
                    None => {
                        let result = self.invoke(idx, event, random, services);
                        let outcome = match result {
                            Ok(outcome) => outcome,
                            Err(report) => {
                                let label = &self.modules[idx].label;
                                if policy == FailurePolicy::Abort {
                                    summary.modules[idx].record(ModuleOutcome::Fail);
                                    return Err(FrameworkError::ModuleExecution {
                                        label: label.clone(),
                                        event: event.id(),
                                        source: report.into(),
                                    });
                                }
                                warn!(
                                    "Module '{}' failed on event {}: {:#}",
                                    label,
                                    event.id(),
                                    report
                                );
                                ModuleOutcome::Fail
                            }
                        };
                        summary.modules[idx].record(outcome);
                        memo.insert(idx, outcome);

                        if outcome == ModuleOutcome::Fail && policy == FailurePolicy::Abort {
                            return Err(FrameworkError::ModuleExecution {
                                label: self.modules[idx].label.clone(),
                                event: event.id(),
                                source: Box::new(FailOutcome),
                            });
                        }
                        outcome
                    }
                };

                match outcome {
                    ModuleOutcome::Continue => {}
                    ModuleOutcome::Stop => {
                        status = PathStatus::Rejected;
                        break;
                    }
                    ModuleOutcome::Fail => {
                        status = PathStatus::Failed;
                        break;
                    }
                }
            }

            let path = &self.paths[path_idx];
            match status {
                PathStatus::Passed => summary.paths[path_idx].passed += 1,
                PathStatus::Rejected => {
                    debug!("Event {} rejected on {} '{}'", event.id(), path.kind, path.name);
                    summary.paths[path_idx].rejected += 1;
                }
                PathStatus::Failed => {
                    summary.paths[path_idx].failed += 1;
                    if policy == FailurePolicy::SkipEvent {
                        warn!(
                            "Skipping the rest of event {} after failure on {} '{}'",
                            event.id(),
                            path.kind,
                            path.name
                        );
                        return Ok(EventDisposition::Skipped);
                    }
                }
            }
        }

        Ok(EventDisposition::Processed)
    }

    /// End-of-run notification for every module, in reverse order of
    /// addition. Every module is notified even when an earlier one fails.
    pub(crate) fn end_run(&mut self, errors: &mut Vec<FrameworkError>) {
        for module in self.modules.iter_mut().rev() {
            let result = match &mut module.worker {
                Worker::Producer(p) => p.end_run(),
                Worker::Output(o) => o.end_run(),
            };
            if let Err(e) = result {
                errors.push(FrameworkError::Teardown {
                    label: module.label.clone(),
                    source: e.into(),
                });
            }
        }
    }
}
