//! Built-in plugins.
//!
//! | Plugin            | Kind          |
//! |-------------------|---------------|
//! | `PassThrough`     | service       |
//! | `Geometry`        | service       |
//! | `EmptyEvent`      | source        |
//! | `EventListSource` | source        |
//! | `SingleGen`       | producer      |
//! | `EventDump`       | output module |

pub mod empty_event;
pub mod event_dump;
pub mod event_list;
pub mod geometry;
pub mod passthrough;
pub mod single_gen;

pub use empty_event::EmptyEventSource;
pub use event_dump::EventDump;
pub use event_list::EventListSource;
pub use geometry::GeometryService;
pub use passthrough::PassThroughService;
pub use single_gen::{Particle, SingleGen};

use crate::process::ComponentFactory;

/// Register every built-in plugin with `factory`.
pub fn register_builtins(factory: &mut ComponentFactory) {
    factory.register_service("PassThrough", |ctx| Ok(PassThroughService::new(ctx)));
    factory.register_service("Geometry", GeometryService::new);
    factory.register_source("EmptyEvent", EmptyEventSource::new);
    factory.register_source("EventListSource", EventListSource::new);
    factory.register_producer("SingleGen", SingleGen::new);
    factory.register_output("EventDump", EventDump::new);
}
