//! Source reading event ids from plain text files.
//!
//! Each non-blank line that does not start with `#` holds
//! `run subrun event`. Files are read in the order given by `fileNames`.

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{debug, info};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;

use crate::process::{Event, EventId, InitContext, Source};
use crate::pset::FileInPath;

struct OpenFile {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

pub struct EventListSource {
    pending: VecDeque<PathBuf>,
    current: Option<OpenFile>,
}

impl EventListSource {
    /// Every entry of `fileNames` is resolved along the search path here,
    /// so a missing file fails initialization.
    pub fn new(ctx: &InitContext<'_>) -> Result<Self> {
        let names: Vec<String> = ctx.param("fileNames")?;
        let mut pending = VecDeque::with_capacity(names.len());
        for name in names {
            let path = FileInPath::new(name).resolve(ctx.search_path())?;
            pending.push_back(path);
        }
        info!("Source '{}' reads {} event list(s)", ctx.label(), pending.len());
        Ok(EventListSource {
            pending,
            current: None,
        })
    }

    fn open_next(&mut self) -> Result<bool> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(false);
        };
        let file = File::open(&path)
            .wrap_err_with(|| format!("Failed to open event list {}", path.display()))?;
        debug!("Reading events from {}", path.display());
        self.current = Some(OpenFile {
            path,
            lines: BufReader::new(file).lines(),
            line_no: 0,
        });
        Ok(true)
    }
}

fn parse_line(line: &str) -> Option<EventId> {
    let mut fields = line.split_whitespace().map(|f| f.parse::<u32>());
    let run = fields.next()?.ok()?;
    let subrun = fields.next()?.ok()?;
    let event = fields.next()?.ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(EventId::new(run, subrun, event))
}

impl Source for EventListSource {
    fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            if self.current.is_none() && !self.open_next()? {
                return Ok(None);
            }
            let Some(file) = self.current.as_mut() else {
                return Ok(None);
            };

            match file.lines.next() {
                None => self.current = None,
                Some(line) => {
                    file.line_no += 1;
                    let line = line.wrap_err_with(|| {
                        format!("Failed to read {}:{}", file.path.display(), file.line_no)
                    })?;
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    let id = parse_line(trimmed).ok_or_else(|| {
                        eyre!(
                            "{}:{}: expected 'run subrun event', got '{}'",
                            file.path.display(),
                            file.line_no,
                            trimmed
                        )
                    })?;
                    return Ok(Some(Event::new(id)));
                }
            }
        }
    }

    fn end_run(&mut self) -> Result<()> {
        self.current = None;
        self.pending.clear();
        Ok(())
    }
}
