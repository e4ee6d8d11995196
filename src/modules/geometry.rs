//! Detector geometry provider.
//!
//! The geometry description itself is opaque: the service resolves its
//! `GDML` file when it is created and exposes the resolved location along
//! with the optional world ("big box") extent.

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::any::Any;
use std::path::{Path, PathBuf};

use crate::process::{InitContext, Service};

const DEFAULT_BIG_BOX_RANGE: f64 = 1500.0;

/// Axis-aligned box, in cm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl WorldBox {
    pub fn contains(&self, point: [f64; 3]) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }
}

#[derive(Debug, Clone)]
pub struct GeometryService {
    gdml: PathBuf,
    big_box_used: bool,
    big_box_range: f64,
}

impl GeometryService {
    /// Parameters: `GDML` (FileInPath, required), `BigBoxUsed` (bool,
    /// default false), `BigBoxRange` (double, default 1500).
    pub fn new(ctx: &InitContext<'_>) -> Result<Self> {
        let gdml = ctx
            .resolve_file("GDML")
            .wrap_err("Failed to locate the geometry description")?;
        let big_box_used = ctx.param_or("BigBoxUsed", false)?;
        let big_box_range = ctx.param_or("BigBoxRange", DEFAULT_BIG_BOX_RANGE)?;

        info!("Geometry '{}' loaded from {}", ctx.label(), gdml.display());
        Ok(GeometryService {
            gdml,
            big_box_used,
            big_box_range,
        })
    }

    /// Resolved location of the GDML file.
    pub fn gdml(&self) -> &Path {
        &self.gdml
    }

    pub fn big_box_used(&self) -> bool {
        self.big_box_used
    }

    /// The world box, if a big box is in use.
    pub fn world_box(&self) -> Option<WorldBox> {
        if !self.big_box_used {
            return None;
        }
        let r = self.big_box_range.abs();
        Some(WorldBox {
            min: [-r, -r, -r],
            max: [r, r, r],
        })
    }
}

impl Service for GeometryService {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
