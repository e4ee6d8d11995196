//! Component capabilities and the contexts handed to them.
//!
//! A plugin name resolves (through the [`ComponentFactory`]) to exactly one
//! of the four capabilities below, wrapped in [`Component`]. Implementations
//! report failures as `color_eyre` reports; the process attaches them to
//! the failing component's label.
//!
//! [`ComponentFactory`]: crate::process::ComponentFactory

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::ConfigError;
use crate::pset::{FileInPath, ParamValue, ParameterError, ParameterSet, SearchPath};
use crate::random::{Engine, RandomNumberManager};
use crate::registry::ComponentKind;
use crate::schedule::ModuleOutcome;

use super::event::Event;

/// A process-wide singleton available to every component.
pub trait Service {
    fn begin_run(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_run(&mut self) -> Result<()> {
        Ok(())
    }

    /// Downcast support for [`ServiceHandle::with`].
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Produces the stream of events.
pub trait Source {
    /// The next event, or `None` at end of stream.
    fn next_event(&mut self) -> Result<Option<Event>>;

    fn end_run(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Computes data products and attaches them to the event.
pub trait Producer {
    fn begin_run(&mut self, _ctx: &mut ModuleContext<'_>) -> Result<()> {
        Ok(())
    }

    fn produce(&mut self, event: &mut Event, ctx: &mut ModuleContext<'_>) -> Result<ModuleOutcome>;

    fn end_run(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Persists or surfaces event data; only reads the event.
pub trait OutputModule {
    fn begin_run(&mut self, _ctx: &mut ModuleContext<'_>) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, event: &Event, ctx: &mut ModuleContext<'_>) -> Result<ModuleOutcome>;

    /// Flush and close whatever the module owns.
    fn end_run(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An instantiated component.
pub enum Component {
    Service(Box<dyn Service>),
    Source(Box<dyn Source>),
    Producer(Box<dyn Producer>),
    Output(Box<dyn OutputModule>),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Service(_) => ComponentKind::Service,
            Component::Source(_) => ComponentKind::Source,
            Component::Producer(_) => ComponentKind::Producer,
            Component::Output(_) => ComponentKind::OutputModule,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component::{:?}", self.kind())
    }
}

// ── Services ──────────────────────────────────────────────────────────

/// Shared handle to an instantiated service.
#[derive(Clone)]
pub struct ServiceHandle {
    label: Rc<str>,
    inner: Rc<RefCell<Box<dyn Service>>>,
}

impl ServiceHandle {
    pub fn new(label: &str, service: Box<dyn Service>) -> Self {
        ServiceHandle {
            label: Rc::from(label),
            inner: Rc::new(RefCell::new(service)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run `f` on the service if it is a `T`. Returns `None` for another
    /// type, or when the service is already mutably borrowed.
    pub fn with<T: Service + 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard: Ref<'_, Box<dyn Service>> = self.inner.try_borrow().ok()?;
        let result = guard.as_any().downcast_ref::<T>().map(f);
        result
    }

    /// Run `f` on the service mutably if it is a `T`. Returns `None` for
    /// another type, or when the service is already borrowed.
    pub fn with_mut<T: Service + 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard: RefMut<'_, Box<dyn Service>> = self.inner.try_borrow_mut().ok()?;
        let result = guard.as_any_mut().downcast_mut::<T>().map(f);
        result
    }

    pub fn is<T: Service + 'static>(&self) -> bool {
        self.inner
            .try_borrow()
            .is_ok_and(|service| service.as_any().is::<T>())
    }

    fn exclusive(&self) -> Result<RefMut<'_, Box<dyn Service>>> {
        self.inner
            .try_borrow_mut()
            .map_err(|_| eyre!("service '{}' is already in use", self.label))
    }

    pub(crate) fn begin_run(&self) -> Result<()> {
        self.exclusive()?.begin_run()
    }

    pub(crate) fn end_run(&self) -> Result<()> {
        self.exclusive()?.end_run()
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("label", &self.label)
            .finish()
    }
}

/// Instantiated services in initialization order.
#[derive(Debug, Clone, Default)]
pub struct ServiceTable {
    services: Vec<ServiceHandle>,
}

impl ServiceTable {
    pub fn new() -> Self {
        ServiceTable::default()
    }

    pub(crate) fn insert(&mut self, handle: ServiceHandle) {
        self.services.push(handle);
    }

    pub fn get(&self, name: &str) -> Result<ServiceHandle, ConfigError> {
        self.services
            .iter()
            .find(|s| s.label() == name)
            .cloned()
            .ok_or_else(|| ConfigError::ServiceNotFound {
                name: name.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceHandle> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

// ── Contexts ──────────────────────────────────────────────────────────

/// Everything a component may consult while being constructed.
pub struct InitContext<'a> {
    label: &'a str,
    plugin: &'a str,
    params: &'a ParameterSet,
    services: &'a ServiceTable,
    search_path: &'a SearchPath,
}

impl<'a> InitContext<'a> {
    pub fn new(
        label: &'a str,
        plugin: &'a str,
        params: &'a ParameterSet,
        services: &'a ServiceTable,
        search_path: &'a SearchPath,
    ) -> Self {
        InitContext {
            label,
            plugin,
            params,
            services,
            search_path,
        }
    }

    pub fn label(&self) -> &'a str {
        self.label
    }

    pub fn plugin(&self) -> &'a str {
        self.plugin
    }

    pub fn params(&self) -> &'a ParameterSet {
        self.params
    }

    /// Read a required parameter; a failure names this component.
    pub fn param<T: ParamValue>(&self, key: &str) -> Result<T, ConfigError> {
        self.params.get(key).map_err(|source| self.parameter_error(source))
    }

    /// Read an optional parameter, see [`ParameterSet::get_or`].
    pub fn param_or<T: ParamValue>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        self.params
            .get_or(key, default)
            .map_err(|source| self.parameter_error(source))
    }

    fn parameter_error(&self, source: ParameterError) -> ConfigError {
        ConfigError::Parameter {
            component: self.label.to_string(),
            source,
        }
    }

    /// Look up a service instantiated earlier in this process.
    pub fn get_service(&self, name: &str) -> Result<ServiceHandle, ConfigError> {
        self.services.get(name)
    }

    pub fn search_path(&self) -> &'a SearchPath {
        self.search_path
    }

    /// Read the `FileInPath` parameter `key` and resolve it now.
    pub fn resolve_file(&self, key: &str) -> Result<PathBuf, ParameterError> {
        let file: FileInPath = self.params.get(key)?;
        file.resolve(self.search_path)
    }
}

/// Per-invocation context handed to producers and output modules.
pub struct ModuleContext<'a> {
    label: &'a str,
    random: &'a mut RandomNumberManager,
    services: &'a ServiceTable,
    sequence: u64,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(
        label: &'a str,
        random: &'a mut RandomNumberManager,
        services: &'a ServiceTable,
        sequence: u64,
    ) -> Self {
        ModuleContext {
            label,
            random,
            services,
            sequence,
        }
    }

    /// Label of the module being run.
    pub fn label(&self) -> &'a str {
        self.label
    }

    /// This module's own random engine.
    pub fn engine(&mut self) -> &mut Engine {
        self.random.engine(self.label)
    }

    pub fn get_service(&self, name: &str) -> Result<ServiceHandle, ConfigError> {
        self.services.get(name)
    }

    /// Process-wide invocation counter, strictly increasing across all
    /// module invocations of a run.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
