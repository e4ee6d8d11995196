use clap::Parser;
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use evproc::config_loader::{self, CliOverrides};
use evproc::process::{ComponentFactory, MaxEvents, ProcessBuilder};
use evproc::registry::ComponentKind;

/// Run a modular event-processing job described by a YAML file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the process description YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Maximum number of events to read (-1 or "unbounded" for no limit)
    #[arg(long, value_parser = MaxEvents::parse, allow_hyphen_values = true)]
    max_events: Option<MaxEvents>,

    /// Master seed from which per-module seeds are derived
    #[arg(long)]
    master_seed: Option<u64>,

    /// Extra directory to search for FileInPath parameters (repeatable)
    #[arg(long = "search-path", value_name = "DIR")]
    search_path: Vec<PathBuf>,

    /// Continue every random stream from a saved seed table
    #[arg(long, value_name = "FILE")]
    restore_seeds: Option<PathBuf>,

    /// Save the random engine states at the end of the run
    #[arg(long, value_name = "FILE")]
    save_seeds: Option<PathBuf>,

    /// Write the run summary as JSON
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Validate the configuration and exit without processing events
    #[arg(long)]
    check: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            max_events: self.max_events,
            master_seed: self.master_seed,
            search_dirs: self.search_path.clone(),
            restore_seeds: self.restore_seeds.clone(),
        }
    }
}

/// Everything `--check` can verify without instantiating components.
fn check(builder: &ProcessBuilder, factory: &ComponentFactory) -> Result<()> {
    let registry = builder.registry();
    registry.source().wrap_err("Configuration cannot run")?;

    let active = builder.schedule().active_modules();
    for decl in registry.iter() {
        // Unknown services fall back to pass-through; unscheduled modules
        // are never created.
        let needed = match decl.kind {
            ComponentKind::Service => false,
            ComponentKind::Source => true,
            _ => active.contains(&decl.label),
        };
        if needed && !factory.contains(&decl.plugin) {
            bail!(
                "{} '{}' uses unknown plugin '{}' (known: {})",
                decl.kind,
                decl.label,
                decl.plugin,
                factory.plugins().join(", ")
            );
        }
        info!(
            "{:<14} {:<20} {:<16} {}",
            decl.kind.to_string(),
            decl.label,
            decl.plugin,
            decl.params.id()
        );
    }
    for path in builder.schedule().iter() {
        info!("{} '{}': [{}]", path.kind, path.name, path.modules.join(", "));
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting evproc v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {:?}", args.config);

    let builder = config_loader::load_process(&args.config, &args.overrides())?;
    let factory = ComponentFactory::with_builtins();

    if args.check {
        check(&builder, &factory)?;
        info!("Configuration is valid");
        return Ok(());
    }

    let mut process = builder.build();
    let result = process.run(&factory);

    if let Some(path) = &args.save_seeds {
        process.seed_table().save(path)?;
    }
    if let Some(path) = &args.summary {
        process.summary().save(path)?;
    }

    result.wrap_err_with(|| format!("Process '{}' failed", process.name()))?;
    info!("Process '{}' completed successfully", process.name());
    Ok(())
}
