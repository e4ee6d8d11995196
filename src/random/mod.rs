//! # Per-module random number engines
//!
//! Every module that draws random numbers gets its own engine, created the
//! first time it is requested and reused for the rest of the run. Seeds
//! come from, in order of precedence:
//!
//! 1. a restored [`SeedTable`] (exact replay of a saved run),
//! 2. the module's explicit `Seed` parameter,
//! 3. a seed derived from the process master seed and the module label.
//!
//! Because each module owns its stream and only draws from it while it
//! runs, the numbers a module sees depend only on the configuration and
//! the master seed, never on how paths are laid out.

use log::{debug, info, warn};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::pset::{ParamType, ParameterError, ParameterSet};
use crate::utils::hash::{fnv1a, hash_combine};

/// Upper bound (exclusive) for derived seeds.
pub const MAX_SEED: u64 = 900_000_000;

/// Name of the per-module explicit seed parameter.
pub const SEED_PARAMETER: &str = "Seed";

/// Errors related to seeds and seed tables.
#[derive(Debug, thiserror::Error)]
pub enum RandomError {
    #[error("invalid 'Seed' parameter for '{label}'")]
    Seed {
        label: String,
        #[source]
        source: ParameterError,
    },

    #[error("seed for '{label}' must be non-negative, got {value}")]
    NegativeSeed { label: String, value: i32 },

    #[error("cannot access seed table '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed seed table '{path}'")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Saved position of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub seed: u64,
    /// Number of 32-bit words consumed from the stream.
    pub word_pos: u128,
}

/// A module's random engine.
#[derive(Debug, Clone)]
pub struct Engine {
    seed: u64,
    rng: ChaCha8Rng,
}

impl Engine {
    pub fn new(seed: u64) -> Self {
        Engine {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn restore(state: &EngineState) -> Self {
        let mut engine = Engine::new(state.seed);
        engine.rng.set_word_pos(state.word_pos);
        engine
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn state(&self) -> EngineState {
        EngineState {
            seed: self.seed,
            word_pos: self.rng.get_word_pos(),
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Normal draw (Box-Muller). A zero `sigma` returns `mean` without
    /// consuming the stream.
    pub fn gaussian(&mut self, mean: f64, sigma: f64) -> f64 {
        if sigma == 0.0 {
            return mean;
        }
        // 1 - u keeps the log argument in (0, 1].
        let u1 = 1.0 - self.uniform();
        let u2 = self.uniform();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + sigma * z
    }
}

impl RngCore for Engine {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Persistable snapshot of all engines of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedTable {
    pub master_seed: u64,
    pub engines: BTreeMap<String, EngineState>,
}

impl SeedTable {
    pub fn save(&self, path: &Path) -> Result<(), RandomError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| RandomError::Format {
            path: path.display().to_string(),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| RandomError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        info!("Saved {} engine states to {}", self.engines.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, RandomError> {
        let content = fs::read_to_string(path).map_err(|e| RandomError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| RandomError::Format {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Derive the default seed of `label` from the master seed.
pub fn derive_seed(master_seed: u64, label: &str) -> u64 {
    hash_combine(master_seed, fnv1a(label.as_bytes())) % MAX_SEED
}

/// Read a module's explicit `Seed` parameter (int32 >= 0 or uint32).
pub fn explicit_seed(label: &str, params: &ParameterSet) -> Result<Option<u64>, RandomError> {
    let seed_error = |source| RandomError::Seed {
        label: label.to_string(),
        source,
    };

    match params.param_type(SEED_PARAMETER) {
        None => Ok(None),
        Some(ParamType::Uint32) => {
            let seed: u32 = params.get(SEED_PARAMETER).map_err(seed_error)?;
            Ok(Some(seed as u64))
        }
        Some(ParamType::Int32) => {
            let seed: i32 = params.get(SEED_PARAMETER).map_err(seed_error)?;
            if seed < 0 {
                return Err(RandomError::NegativeSeed {
                    label: label.to_string(),
                    value: seed,
                });
            }
            Ok(Some(seed as u64))
        }
        Some(found) => Err(seed_error(ParameterError::TypeMismatch {
            key: SEED_PARAMETER.to_string(),
            expected: ParamType::Int32,
            found,
        })),
    }
}

/// Owns every module's engine for one run.
#[derive(Debug, Clone, Default)]
pub struct RandomNumberManager {
    master_seed: u64,
    explicit: HashMap<String, u64>,
    restored: BTreeMap<String, EngineState>,
    engines: BTreeMap<String, Engine>,
}

impl RandomNumberManager {
    pub fn new(master_seed: u64) -> Self {
        RandomNumberManager {
            master_seed,
            ..RandomNumberManager::default()
        }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Pin the seed of `label`. Has no effect on an engine already created.
    pub fn set_explicit_seed(&mut self, label: &str, seed: u64) {
        self.explicit.insert(label.to_string(), seed);
    }

    /// Continue from a saved table; its states override every other seed.
    pub fn restore(&mut self, table: SeedTable) {
        if table.master_seed != self.master_seed {
            warn!(
                "Restoring engines saved with master seed {} into a run with master seed {}",
                table.master_seed, self.master_seed
            );
        }
        info!("Restoring {} engine states", table.engines.len());
        self.restored = table.engines;
    }

    /// The engine of `label`, created on first use.
    ///
    /// Every call within a run returns the same engine.
    pub fn engine(&mut self, label: &str) -> &mut Engine {
        let master_seed = self.master_seed;
        let restored = &self.restored;
        let explicit = &self.explicit;

        self.engines.entry(label.to_string()).or_insert_with(|| {
            if let Some(state) = restored.get(label) {
                debug!("Engine '{}' restored at word {}", label, state.word_pos);
                Engine::restore(state)
            } else if let Some(&seed) = explicit.get(label) {
                debug!("Engine '{}' uses explicit seed {}", label, seed);
                Engine::new(seed)
            } else {
                let seed = derive_seed(master_seed, label);
                debug!("Engine '{}' uses derived seed {}", label, seed);
                Engine::new(seed)
            }
        })
    }

    pub fn has_engine(&self, label: &str) -> bool {
        self.engines.contains_key(label)
    }

    /// Current state of every created engine. Restored states for modules
    /// that never drew in this run are carried over unchanged.
    pub fn snapshot(&self) -> SeedTable {
        let mut engines = self.restored.clone();
        for (label, engine) in &self.engines {
            engines.insert(label.clone(), engine.state());
        }
        SeedTable {
            master_seed: self.master_seed,
            engines,
        }
    }
}
