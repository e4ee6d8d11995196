//! Plugin factory.
//!
//! Maps plugin names to constructors. Each constructor receives an
//! [`InitContext`] and returns one [`Component`]; the factory checks that
//! what it built matches the kind the component was declared with.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use log::debug;
use std::collections::HashMap;

use crate::modules::PassThroughService;
use crate::registry::{ComponentDecl, ComponentKind};

use super::component::{Component, InitContext, OutputModule, Producer, Service, Source};

type Maker = Box<dyn Fn(&InitContext<'_>) -> Result<Component>>;

/// Registry of plugin constructors keyed by plugin name.
pub struct ComponentFactory {
    makers: HashMap<String, Maker>,
    passthrough_fallback: bool,
}

impl ComponentFactory {
    /// An empty factory. Unknown service plugins still fall back to the
    /// pass-through service.
    pub fn new() -> Self {
        ComponentFactory {
            makers: HashMap::new(),
            passthrough_fallback: true,
        }
    }

    /// A factory with every built-in plugin registered.
    pub fn with_builtins() -> Self {
        let mut factory = ComponentFactory::new();
        crate::modules::register_builtins(&mut factory);
        factory
    }

    /// Disable the pass-through fallback for undeclared service plugins.
    pub fn strict(mut self) -> Self {
        self.passthrough_fallback = false;
        self
    }

    /// Register a raw constructor. A later registration replaces an
    /// earlier one with the same name.
    pub fn register<F>(&mut self, plugin: &str, maker: F)
    where
        F: Fn(&InitContext<'_>) -> Result<Component> + 'static,
    {
        self.makers.insert(plugin.to_string(), Box::new(maker));
    }

    pub fn register_service<S, F>(&mut self, plugin: &str, maker: F)
    where
        S: Service + 'static,
        F: Fn(&InitContext<'_>) -> Result<S> + 'static,
    {
        self.register(plugin, move |ctx| Ok(Component::Service(Box::new(maker(ctx)?))));
    }

    pub fn register_source<S, F>(&mut self, plugin: &str, maker: F)
    where
        S: Source + 'static,
        F: Fn(&InitContext<'_>) -> Result<S> + 'static,
    {
        self.register(plugin, move |ctx| Ok(Component::Source(Box::new(maker(ctx)?))));
    }

    pub fn register_producer<P, F>(&mut self, plugin: &str, maker: F)
    where
        P: Producer + 'static,
        F: Fn(&InitContext<'_>) -> Result<P> + 'static,
    {
        self.register(plugin, move |ctx| Ok(Component::Producer(Box::new(maker(ctx)?))));
    }

    pub fn register_output<O, F>(&mut self, plugin: &str, maker: F)
    where
        O: OutputModule + 'static,
        F: Fn(&InitContext<'_>) -> Result<O> + 'static,
    {
        self.register(plugin, move |ctx| Ok(Component::Output(Box::new(maker(ctx)?))));
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.makers.contains_key(plugin)
    }

    /// Registered plugin names, sorted.
    pub fn plugins(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.makers.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate `decl`.
    pub fn create(&self, decl: &ComponentDecl, ctx: &InitContext<'_>) -> Result<Component> {
        let component = match self.makers.get(&decl.plugin) {
            Some(maker) => maker(ctx)?,
            None if decl.kind == ComponentKind::Service && self.passthrough_fallback => {
                debug!(
                    "No plugin '{}' registered; '{}' is a pass-through service",
                    decl.plugin, decl.label
                );
                Component::Service(Box::new(PassThroughService::new(ctx)))
            }
            None => {
                return Err(eyre!(
                    "no plugin named '{}' is registered for {} '{}'",
                    decl.plugin,
                    decl.kind,
                    decl.label
                ))
            }
        };

        if component.kind() != decl.kind {
            return Err(eyre!(
                "plugin '{}' provides a {} but '{}' is declared as a {}",
                decl.plugin,
                component.kind(),
                decl.label,
                decl.kind
            ));
        }
        Ok(component)
    }
}

impl Default for ComponentFactory {
    fn default() -> Self {
        Self::new()
    }
}
