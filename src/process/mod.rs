//! # Process engine
//!
//! A [`Process`] is one run: the declared components, the schedule, the
//! random engines and the lifecycle state machine. It is assembled with a
//! [`ProcessBuilder`] and driven with [`Process::run`], or step by step
//! with [`Process::initialize`], [`Process::run_events`] and
//! [`Process::finish`].
//!
//! ```text
//! initialize:  services (declared order) -> source -> scheduled modules
//! run_events:  begin_run, then per event: paths, then end paths
//! finish:      end_run in reverse order (modules, source, services)
//! ```
//!
//! Any error moves the process to [`ProcessState::Failed`]. Teardown is
//! still attempted for every component instantiated so far.

pub mod component;
pub mod event;
pub mod factory;
pub mod state;
pub mod summary;

mod executor;

pub use component::{
    Component, InitContext, ModuleContext, OutputModule, Producer, Service, ServiceHandle,
    ServiceTable, Source,
};
pub use event::{Event, EventId, ProductError, ProductKey};
pub use executor::FailOutcome;
pub use factory::ComponentFactory;
pub use state::ProcessState;
pub use summary::{ModuleSummary, PathSummary, RunSummary};

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ConfigError, FrameworkError, FrameworkResult};
use crate::pset::{ParameterSet, SearchPath};
use crate::random::{explicit_seed, RandomNumberManager, SeedTable};
use crate::registry::{ComponentKind, ComponentRegistry};
use crate::schedule::Schedule;

use executor::{EventDisposition, Executor, Worker};

/// Upper bound on the number of events read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxEvents {
    Bounded(u64),
    #[default]
    Unbounded,
}

impl MaxEvents {
    /// `-1` means unbounded; other negative values are rejected.
    pub fn from_i64(value: i64) -> Result<Self, ConfigError> {
        match value {
            -1 => Ok(MaxEvents::Unbounded),
            n if n >= 0 => Ok(MaxEvents::Bounded(n as u64)),
            n => Err(ConfigError::InvalidMaxEvents {
                value: n.to_string(),
            }),
        }
    }

    /// Accepts an integer (see [`MaxEvents::from_i64`]) or `"unbounded"`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("unbounded") {
            return Ok(MaxEvents::Unbounded);
        }
        let n: i64 = trimmed.parse().map_err(|_| ConfigError::InvalidMaxEvents {
            value: value.to_string(),
        })?;
        MaxEvents::from_i64(n)
    }

    /// Whether another event may be read after `read` events.
    pub fn allows(&self, read: u64) -> bool {
        match self {
            MaxEvents::Bounded(n) => read < *n,
            MaxEvents::Unbounded => true,
        }
    }
}

impl fmt::Display for MaxEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxEvents::Bounded(n) => write!(f, "{}", n),
            MaxEvents::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// What to do when a module fails on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run with a `ModuleExecution` error.
    #[default]
    Abort,
    /// Mark the path failed and carry on with the other paths.
    FailPath,
    /// Drop the rest of the event and move to the next one.
    SkipEvent,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::FailPath => "fail_path",
            FailurePolicy::SkipEvent => "skip_event",
        };
        write!(f, "{}", name)
    }
}

/// Cooperative cancellation flag, checked before each event is read.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        StopHandle::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Collects the description of a process before it is built.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    name: String,
    max_events: MaxEvents,
    master_seed: u64,
    failure_policy: FailurePolicy,
    search_dirs: Vec<PathBuf>,
    restore_seeds: Option<SeedTable>,
    registry: ComponentRegistry,
    schedule: Schedule,
}

impl ProcessBuilder {
    pub fn new(name: &str) -> Self {
        ProcessBuilder {
            name: name.to_string(),
            max_events: MaxEvents::Unbounded,
            master_seed: 0,
            failure_policy: FailurePolicy::Abort,
            search_dirs: Vec::new(),
            restore_seeds: None,
            registry: ComponentRegistry::new(),
            schedule: Schedule::new(),
        }
    }

    pub fn max_events(&mut self, max_events: MaxEvents) -> &mut Self {
        self.max_events = max_events;
        self
    }

    pub fn master_seed(&mut self, seed: u64) -> &mut Self {
        self.master_seed = seed;
        self
    }

    pub fn failure_policy(&mut self, policy: FailurePolicy) -> &mut Self {
        self.failure_policy = policy;
        self
    }

    /// Append a directory to the search path for `FileInPath` parameters.
    pub fn search_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.search_dirs.push(dir.into());
        self
    }

    /// Start every engine from a previously saved table.
    pub fn restore_seeds(&mut self, table: SeedTable) -> &mut Self {
        self.restore_seeds = Some(table);
        self
    }

    pub fn declare(
        &mut self,
        label: &str,
        kind: ComponentKind,
        plugin: &str,
        params: ParameterSet,
    ) -> Result<&mut Self, ConfigError> {
        self.registry.declare(label, kind, plugin, params)?;
        Ok(self)
    }

    pub fn service(
        &mut self,
        label: &str,
        plugin: &str,
        params: ParameterSet,
    ) -> Result<&mut Self, ConfigError> {
        self.declare(label, ComponentKind::Service, plugin, params)
    }

    pub fn source(
        &mut self,
        label: &str,
        plugin: &str,
        params: ParameterSet,
    ) -> Result<&mut Self, ConfigError> {
        self.declare(label, ComponentKind::Source, plugin, params)
    }

    pub fn producer(
        &mut self,
        label: &str,
        plugin: &str,
        params: ParameterSet,
    ) -> Result<&mut Self, ConfigError> {
        self.declare(label, ComponentKind::Producer, plugin, params)
    }

    pub fn output(
        &mut self,
        label: &str,
        plugin: &str,
        params: ParameterSet,
    ) -> Result<&mut Self, ConfigError> {
        self.declare(label, ComponentKind::OutputModule, plugin, params)
    }

    /// Declare a path over components declared so far.
    pub fn path<S: AsRef<str>>(&mut self, name: &str, modules: &[S]) -> Result<&mut Self, ConfigError> {
        self.schedule.build_path(&self.registry, name, modules)?;
        Ok(self)
    }

    /// Declare an end path over components declared so far.
    pub fn end_path<S: AsRef<str>>(
        &mut self,
        name: &str,
        modules: &[S],
    ) -> Result<&mut Self, ConfigError> {
        self.schedule.build_end_path(&self.registry, name, modules)?;
        Ok(self)
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Freeze the description into a process in the `Configured` state.
    pub fn build(&self) -> Process {
        let mut search_path = SearchPath::from_env();
        for dir in &self.search_dirs {
            search_path.push(dir.clone());
        }

        let mut random = RandomNumberManager::new(self.master_seed);
        if let Some(table) = &self.restore_seeds {
            random.restore(table.clone());
        }

        Process {
            name: self.name.clone(),
            max_events: self.max_events,
            failure_policy: self.failure_policy,
            search_path,
            registry: self.registry.clone(),
            schedule: self.schedule.clone(),
            random,
            state: ProcessState::Configured,
            history: vec![ProcessState::Configured],
            stop: StopHandle::new(),
            services: ServiceTable::new(),
            source: None,
            executor: Executor::new(),
            torn_down: false,
            summary: RunSummary::new(&self.name),
        }
    }
}

/// One run of the framework.
pub struct Process {
    name: String,
    max_events: MaxEvents,
    failure_policy: FailurePolicy,
    search_path: SearchPath,
    registry: ComponentRegistry,
    schedule: Schedule,
    random: RandomNumberManager,
    state: ProcessState,
    history: Vec<ProcessState>,
    stop: StopHandle,
    services: ServiceTable,
    source: Option<(String, Box<dyn Source>)>,
    executor: Executor,
    torn_down: bool,
    summary: RunSummary,
}

impl Process {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Every state visited so far, starting with `Configured`.
    pub fn history(&self) -> &[ProcessState] {
        &self.history
    }

    pub fn max_events(&self) -> MaxEvents {
        self.max_events
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn services(&self) -> &ServiceTable {
        &self.services
    }

    pub fn random(&self) -> &RandomNumberManager {
        &self.random
    }

    /// Current state of every engine, suitable for [`SeedTable::save`].
    pub fn seed_table(&self) -> SeedTable {
        self.random.snapshot()
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// A handle that can stop the event loop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Initialize, run every event and finish.
    pub fn run(&mut self, factory: &ComponentFactory) -> FrameworkResult<RunSummary> {
        self.initialize(factory)?;
        self.run_events()?;
        self.finish()?;
        Ok(self.summary.clone())
    }

    /// Instantiate services, the source and every scheduled module.
    pub fn initialize(&mut self, factory: &ComponentFactory) -> FrameworkResult<()> {
        self.check_state(ProcessState::Initialized)?;
        info!("Initializing process '{}'", self.name);
        match self.instantiate(factory) {
            Ok(()) => self.transition(ProcessState::Initialized),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn instantiate(&mut self, factory: &ComponentFactory) -> FrameworkResult<()> {
        let source_decl = self.registry.source()?.clone();

        let active = self.schedule.active_modules();
        for label in &active {
            let decl = self.registry.lookup(label)?;
            if let Some(seed) = explicit_seed(label, &decl.params)? {
                self.random.set_explicit_seed(label, seed);
            }
        }

        let services: Vec<_> = self.registry.services().cloned().collect();
        for decl in &services {
            let component = {
                let ctx = InitContext::new(
                    &decl.label,
                    &decl.plugin,
                    &decl.params,
                    &self.services,
                    &self.search_path,
                );
                factory.create(decl, &ctx)
            };
            match component {
                Ok(Component::Service(service)) => {
                    debug!("Service '{}' ({}) ready", decl.label, decl.plugin);
                    self.services.insert(ServiceHandle::new(&decl.label, service));
                }
                Ok(other) => return Err(kind_mismatch(&decl.label, &other)),
                Err(e) => {
                    return Err(FrameworkError::ComponentInit {
                        label: decl.label.clone(),
                        source: e.into(),
                    })
                }
            }
        }

        let component = {
            let ctx = InitContext::new(
                &source_decl.label,
                &source_decl.plugin,
                &source_decl.params,
                &self.services,
                &self.search_path,
            );
            factory.create(&source_decl, &ctx)
        };
        match component {
            Ok(Component::Source(source)) => {
                debug!("Source '{}' ({}) ready", source_decl.label, source_decl.plugin);
                self.source = Some((source_decl.label.clone(), source));
            }
            Ok(other) => return Err(kind_mismatch(&source_decl.label, &other)),
            Err(e) => {
                return Err(FrameworkError::ComponentInit {
                    label: source_decl.label.clone(),
                    source: e.into(),
                })
            }
        }

        for label in &active {
            let decl = self.registry.lookup(label)?.clone();
            let component = {
                let ctx = InitContext::new(
                    &decl.label,
                    &decl.plugin,
                    &decl.params,
                    &self.services,
                    &self.search_path,
                );
                factory.create(&decl, &ctx)
            };
            let worker = match component {
                Ok(Component::Producer(p)) => Worker::Producer(p),
                Ok(Component::Output(o)) => Worker::Output(o),
                Ok(other) => return Err(kind_mismatch(&decl.label, &other)),
                Err(e) => {
                    return Err(FrameworkError::ComponentInit {
                        label: decl.label.clone(),
                        source: e.into(),
                    })
                }
            };
            debug!("Module '{}' ({}) ready", decl.label, decl.plugin);
            self.executor.add(&decl.label, worker);
            self.summary.modules.push(ModuleSummary::new(
                &decl.label,
                decl.kind,
                &decl.plugin,
                decl.params.id(),
            ));
        }

        for decl in self.registry.iter() {
            if decl.kind.is_schedulable() && !active.contains(&decl.label) {
                info!("Module '{}' is not on any path and will not run", decl.label);
            }
        }

        self.summary.paths = self.executor.bind(&self.schedule)?;
        info!(
            "Initialized {} services, source '{}' and {} modules",
            self.services.len(),
            source_decl.label,
            self.executor.len()
        );
        Ok(())
    }

    /// Notify every component that the run starts, then read and process
    /// events until the source is exhausted, `max_events` is reached or a
    /// stop is requested.
    pub fn run_events(&mut self) -> FrameworkResult<()> {
        self.check_state(ProcessState::Running)?;
        self.transition(ProcessState::Running)?;
        match self.event_loop() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn event_loop(&mut self) -> FrameworkResult<()> {
        for service in self.services.iter() {
            service.begin_run().map_err(|e| FrameworkError::ComponentInit {
                label: service.label().to_string(),
                source: e.into(),
            })?;
        }
        self.executor.begin_run(&mut self.random, &self.services)?;

        let Some((source_label, source)) = self.source.as_mut() else {
            return Err(ConfigError::NoSource.into());
        };

        info!("Processing events (max_events: {})", self.max_events);
        loop {
            if !self.max_events.allows(self.summary.events_read) {
                info!("Reached max_events = {}", self.max_events);
                break;
            }
            if self.stop.is_stopped() {
                info!("Stop requested after {} events", self.summary.events_read);
                break;
            }

            let mut event = match source.next_event() {
                Ok(Some(event)) => event,
                Ok(None) => {
                    info!("Source '{}' reached end of stream", source_label);
                    break;
                }
                Err(e) => {
                    return Err(FrameworkError::SourceRead {
                        label: source_label.clone(),
                        source: e.into(),
                    })
                }
            };
            self.summary.events_read += 1;
            debug!("Begin event {}", event.id());

            let disposition = self.executor.process_event(
                &mut event,
                self.failure_policy,
                &mut self.random,
                &self.services,
                &mut self.summary,
            )?;
            match disposition {
                EventDisposition::Processed => self.summary.events_processed += 1,
                EventDisposition::Skipped => self.summary.events_skipped += 1,
            }
        }
        Ok(())
    }

    /// End-of-run notifications and the final report.
    pub fn finish(&mut self) -> FrameworkResult<()> {
        self.check_state(ProcessState::Draining)?;
        self.transition(ProcessState::Draining)?;
        if let Some(e) = self.teardown() {
            return Err(self.fail(e));
        }
        self.transition(ProcessState::Finished)?;
        self.finalize_summary();
        self.summary.log_report();
        Ok(())
    }

    /// Notify modules, the source, then services, in reverse initialization
    /// order. Returns the first error; later ones are logged.
    fn teardown(&mut self) -> Option<FrameworkError> {
        if self.torn_down {
            return None;
        }
        self.torn_down = true;

        let mut errors = Vec::new();
        self.executor.end_run(&mut errors);
        if let Some((label, source)) = self.source.as_mut() {
            if let Err(e) = source.end_run() {
                errors.push(FrameworkError::Teardown {
                    label: label.clone(),
                    source: e.into(),
                });
            }
        }
        let services: Vec<ServiceHandle> = self.services.iter().cloned().collect();
        for service in services.iter().rev() {
            if let Err(e) = service.end_run() {
                errors.push(FrameworkError::Teardown {
                    label: service.label().to_string(),
                    source: e.into(),
                });
            }
        }

        let mut errors = errors.into_iter();
        let first = errors.next();
        for extra in errors {
            error!("{}", error_chain(&extra));
        }
        first
    }

    fn check_state(&self, next: ProcessState) -> FrameworkResult<()> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(FrameworkError::InvalidTransition {
                from: self.state,
                to: next,
            })
        }
    }

    fn transition(&mut self, next: ProcessState) -> FrameworkResult<()> {
        self.check_state(next)?;
        info!("Process '{}': {} -> {}", self.name, self.state, next);
        self.state = next;
        self.history.push(next);
        self.summary.final_state = next;
        self.summary.history = self.history.clone();
        Ok(())
    }

    /// Tear down what exists, move to `Failed` and hand `err` back.
    fn fail(&mut self, err: FrameworkError) -> FrameworkError {
        error!("{}", error_chain(&err));
        if let Some(e) = self.teardown() {
            warn!("Teardown after failure also failed: {}", error_chain(&e));
        }
        if !self.state.is_terminal() {
            if let Err(e) = self.transition(ProcessState::Failed) {
                warn!("Could not mark process '{}' failed: {}", self.name, e);
            }
        }
        self.summary.error = Some(error_chain(&err));
        self.finalize_summary();
        self.summary.log_report();
        err
    }

    fn finalize_summary(&mut self) {
        self.summary.finished_at = Some(Utc::now());
        self.summary.final_state = self.state;
        self.summary.history = self.history.clone();
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("max_events", &self.max_events)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

fn kind_mismatch(label: &str, component: &Component) -> FrameworkError {
    FrameworkError::ComponentInit {
        label: label.to_string(),
        source: format!("factory returned a {} component", component.kind()).into(),
    }
}

/// `err: cause: cause...` on one line.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests;
