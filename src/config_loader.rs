use crate::config::{MaxEventsSetting, ProcessConfig};
use crate::process::{MaxEvents, ProcessBuilder};
use crate::random::SeedTable;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and parse a process description from a YAML file
pub fn load_config(config_path: &Path) -> Result<ProcessConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration '{}'", config_path.display()))?;

    let config: ProcessConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Command-line settings that take precedence over the YAML file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub max_events: Option<MaxEvents>,
    pub master_seed: Option<u64>,
    pub search_dirs: Vec<PathBuf>,
    pub restore_seeds: Option<PathBuf>,
}

/// Apply CLI overrides to a configuration
pub fn apply_overrides(config: &mut ProcessConfig, overrides: &CliOverrides) {
    if let Some(max_events) = overrides.max_events {
        info!("max_events overridden to {}", max_events);
        config.process.max_events = match max_events {
            MaxEvents::Bounded(n) => MaxEventsSetting::Count(n as i64),
            MaxEvents::Unbounded => MaxEventsSetting::Count(-1),
        };
    }

    if let Some(seed) = overrides.master_seed {
        info!("master_seed overridden to {}", seed);
        config.process.master_seed = Some(seed);
    }

    config
        .process
        .search_path
        .extend(overrides.search_dirs.iter().cloned());
}

/// Relative search directories in the YAML file are taken relative to the
/// file itself.
fn anchor_search_path(config: &mut ProcessConfig, config_path: &Path) {
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    for dir in config.process.search_path.iter_mut() {
        if dir.is_relative() {
            *dir = base.join(&*dir);
        }
    }
}

/// Load a configuration, apply overrides and declare everything in a
/// process builder.
pub fn load_process(config_path: &Path, overrides: &CliOverrides) -> Result<ProcessBuilder> {
    let mut config = load_config(config_path)?;
    anchor_search_path(&mut config, config_path);
    apply_overrides(&mut config, overrides);

    if config.source.is_none() {
        warn!("Configuration declares no source; the process will fail to start");
    }

    let mut builder = config
        .to_builder()
        .wrap_err("Invalid process description")?;

    if let Some(path) = &overrides.restore_seeds {
        let table = SeedTable::load(path)?;
        builder.restore_seeds(table);
    }

    info!(
        "Process '{}': {} components, {} paths, {} end paths",
        config.process.name,
        builder.registry().len(),
        builder.schedule().paths().len(),
        builder.schedule().end_paths().len()
    );
    Ok(builder)
}
