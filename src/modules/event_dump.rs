//! Output module listing the contents of every event.

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::process::{Event, EventId, InitContext, ModuleContext, OutputModule, ProductKey};
use crate::schedule::ModuleOutcome;

#[derive(Serialize)]
struct DumpRecord<'a> {
    module: &'a str,
    event: EventId,
    products: Vec<ProductKey>,
}

/// Logs each event and, when `fileName` is set, appends one JSON line per
/// event to that file.
pub struct EventDump {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl EventDump {
    pub fn new(ctx: &InitContext<'_>) -> Result<Self> {
        let file_name: String = ctx.param_or("fileName", String::new())?;
        let (path, writer) = if file_name.is_empty() {
            (None, None)
        } else {
            let path = PathBuf::from(file_name);
            let file = File::create(&path)
                .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
            (Some(path), Some(BufWriter::new(file)))
        };
        Ok(EventDump {
            path,
            writer,
            written: 0,
        })
    }

    /// Number of events written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl OutputModule for EventDump {
    fn write(&mut self, event: &Event, ctx: &mut ModuleContext<'_>) -> Result<ModuleOutcome> {
        let record = DumpRecord {
            module: ctx.label(),
            event: event.id(),
            products: event.product_keys(),
        };
        let names: Vec<String> = record
            .products
            .iter()
            .map(|k| format!("{}:{} ({})", k.module, k.instance, k.type_name))
            .collect();
        info!("Event {}: [{}]", record.event, names.join(", "));

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, &record).wrap_err("Failed to encode event record")?;
            writeln!(writer).wrap_err("Failed to write event record")?;
        }
        self.written += 1;
        Ok(ModuleOutcome::Continue)
    }

    fn end_run(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().wrap_err("Failed to flush event dump")?;
            if let Some(path) = &self.path {
                info!("Wrote {} events to {}", self.written, path.display());
            }
        }
        Ok(())
    }
}
