//! # evproc - typed configuration and module scheduling for event processing
//!
//! This library drives modular event-processing jobs: a process declares
//! services, one source of events and a set of producer and output
//! modules wired into paths, and the framework runs those modules over
//! every event the source yields.
//!
//! ## Overview
//!
//! - **Typed parameters**: every component is configured through an
//!   immutable [`pset::ParameterSet`] whose reads are type checked.
//! - **Component registry**: services, the source, producers and output
//!   modules are declared by label and bound to a plugin name.
//! - **Paths**: ordered lists of modules; end paths run after all paths of
//!   an event. A module shared by several paths runs once per event.
//! - **Reproducible randomness**: each module draws from its own engine,
//!   seeded from the master seed and its label; engine states can be saved
//!   and restored for exact replay.
//! - **Run summary**: per-path and per-module counters, logged at the end
//!   of the run and optionally written as JSON.
//!
//! ## Architecture
//!
//! - `pset`: parameter sets, parameter types, `FileInPath` resolution
//! - `registry`: declared components by label
//! - `schedule`: paths and end paths validated against the registry
//! - `random`: per-module engines and seed tables
//! - `process`: the process engine, component traits, factory and summary
//! - `modules`: built-in plugins (geometry, sources, particle gun, dump)
//! - `config` / `config_loader`: the YAML process description
//! - `error`: configuration and framework error types
//! - `utils`: hashing and label helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use evproc::process::{ComponentFactory, MaxEvents, ProcessBuilder};
//! use evproc::pset::ParameterSet;
//!
//! let mut builder = ProcessBuilder::new("Event Display");
//! builder.max_events(MaxEvents::Bounded(3));
//! builder.source(
//!     "source",
//!     "EmptyEvent",
//!     ParameterSet::builder().set("numberEvents", 3)?.build(),
//! )?;
//! builder.output("dump", "EventDump", ParameterSet::new())?;
//! builder.end_path("doit", &["dump"])?;
//!
//! let mut process = builder.build();
//! let summary = process.run(&ComponentFactory::with_builtins())?;
//! assert_eq!(summary.events_processed, 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! process:
//!   name: "Event Display"
//!   max_events: 9999
//! services:
//!   - label: Geometry
//!     params:
//!       GDML: { file_in_path: "Geometry/gdml/ndos.gdml" }
//! source:
//!   label: source
//!   plugin: EventListSource
//!   params:
//!     fileNames: { untracked: { vstring: ["events.txt"] } }
//! producers:
//!   - label: singlegen
//!     plugin: SingleGen
//!     params: { PDG: { vint32: [13] } }
//! end_paths:
//!   - name: doit
//!     modules: [singlegen]
//! ```
//!
//! ## Error Handling
//!
//! Library errors are `thiserror` enums ([`error::ConfigError`],
//! [`error::FrameworkError`], [`pset::ParameterError`]). Component
//! implementations and the configuration loader return
//! `color_eyre::Result`, and the framework keeps those reports as the
//! `source()` of its own errors.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod modules;
pub mod process;
pub mod pset;
pub mod random;
pub mod registry;
pub mod schedule;
pub mod utils;
