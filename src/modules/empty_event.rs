//! Source producing empty events with consecutive numbers.

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::process::{Event, EventId, InitContext, Source};

/// Parameters: `firstRun` (default 1), `firstSubRun` (default 0),
/// `firstEvent` (default 1), all uint32; `numberEvents` int32, `-1` (the
/// default) for no limit.
#[derive(Debug, Clone)]
pub struct EmptyEventSource {
    run: u32,
    subrun: u32,
    /// `None` once the event number has passed `u32::MAX`.
    next_event: Option<u32>,
    remaining: Option<u64>,
}

impl EmptyEventSource {
    pub fn new(ctx: &InitContext<'_>) -> Result<Self> {
        let run = ctx.param_or("firstRun", 1u32)?;
        let subrun = ctx.param_or("firstSubRun", 0u32)?;
        let first_event = ctx.param_or("firstEvent", 1u32)?;
        let number_events: i32 = ctx.param_or("numberEvents", -1)?;

        let remaining = match number_events {
            -1 => None,
            n if n >= 0 => Some(n as u64),
            n => return Err(eyre!("numberEvents must be >= 0 or -1, got {}", n)),
        };

        Ok(EmptyEventSource {
            run,
            subrun,
            next_event: Some(first_event),
            remaining,
        })
    }
}

impl Source for EmptyEventSource {
    fn next_event(&mut self) -> Result<Option<Event>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        let event = self.next_event.ok_or_else(|| {
            eyre!(
                "event number overflow after {}",
                EventId::new(self.run, self.subrun, u32::MAX)
            )
        })?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        self.next_event = event.checked_add(1);
        Ok(Some(Event::new(EventId::new(self.run, self.subrun, event))))
    }
}
