//! Single-particle gun.
//!
//! Every entry of the parallel parameter vectors describes one particle,
//! generated once per event:
//!
//! | Parameter                       | Meaning                              |
//! |---------------------------------|--------------------------------------|
//! | `PDG`                           | particle code                        |
//! | `P0`, `SigmaP`, `PDist`         | momentum (GeV/c), spread, shape      |
//! | `X0` `Y0` `Z0` `T0`             | vertex (cm, ns)                      |
//! | `SigmaX` .. `SigmaT`, `PosDist` | vertex spread and shape              |
//! | `Theta0XZ`, `Theta0YZ`          | direction angles (degrees)           |
//! | `SigmaThetaXZ/YZ`, `AngleDist`  | angular spread and shape             |
//!
//! Shapes are `0` (uniform within +/- sigma) or `1` (gaussian).

use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use log::debug;
use serde::Serialize;

use crate::process::{Event, InitContext, ModuleContext, Producer};
use crate::pset::{ParamValue, ParameterSet};
use crate::random::Engine;
use crate::schedule::ModuleOutcome;

/// A generated particle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Particle {
    pub pdg: i32,
    /// GeV/c^2
    pub mass: f64,
    /// x, y, z (cm), t (ns)
    pub position: [f64; 4],
    /// px, py, pz, E (GeV)
    pub momentum: [f64; 4],
}

impl Particle {
    pub fn p(&self) -> f64 {
        let [px, py, pz, _] = self.momentum;
        (px * px + py * py + pz * pz).sqrt()
    }
}

/// Mass in GeV/c^2 of the particles the gun knows about.
pub fn pdg_mass(pdg: i32) -> Option<f64> {
    let mass = match pdg.abs() {
        11 => 0.000_510_999,
        12 | 14 | 16 | 22 => 0.0,
        13 => 0.105_658_4,
        15 => 1.776_86,
        111 => 0.134_977,
        211 => 0.139_570,
        130 | 310 | 311 => 0.497_611,
        321 => 0.493_677,
        2112 => 0.939_565,
        2212 => 0.938_272,
        _ => return None,
    };
    Some(mass)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dist {
    Uniform,
    Gaussian,
}

impl Dist {
    fn from_code(key: &str, code: i32) -> Result<Self> {
        match code {
            0 => Ok(Dist::Uniform),
            1 => Ok(Dist::Gaussian),
            other => bail!("{} entries must be 0 (uniform) or 1 (gaussian), got {}", key, other),
        }
    }

    fn sample(&self, engine: &mut Engine, mean: f64, sigma: f64) -> f64 {
        match self {
            Dist::Uniform => mean + sigma * (2.0 * engine.uniform() - 1.0),
            Dist::Gaussian => engine.gaussian(mean, sigma),
        }
    }
}

#[derive(Debug, Clone)]
struct Gun {
    pdg: i32,
    mass: f64,
    p0: f64,
    sigma_p: f64,
    p_dist: Dist,
    vertex: [f64; 4],
    sigma_vertex: [f64; 4],
    pos_dist: Dist,
    theta0: [f64; 2],
    sigma_theta: [f64; 2],
    angle_dist: Dist,
}

impl Gun {
    fn fire(&self, engine: &mut Engine) -> Particle {
        let mut position = [0.0; 4];
        for (i, x) in position.iter_mut().enumerate() {
            *x = self.pos_dist.sample(engine, self.vertex[i], self.sigma_vertex[i]);
        }

        let p = self.p_dist.sample(engine, self.p0, self.sigma_p).abs();
        let theta_xz = self
            .angle_dist
            .sample(engine, self.theta0[0], self.sigma_theta[0])
            .to_radians();
        let theta_yz = self
            .angle_dist
            .sample(engine, self.theta0[1], self.sigma_theta[1])
            .to_radians();

        let dir = [
            theta_yz.cos() * theta_xz.sin(),
            theta_yz.sin(),
            theta_yz.cos() * theta_xz.cos(),
        ];
        let energy = (p * p + self.mass * self.mass).sqrt();

        Particle {
            pdg: self.pdg,
            mass: self.mass,
            position,
            momentum: [p * dir[0], p * dir[1], p * dir[2], energy],
        }
    }
}

#[derive(Debug)]
pub struct SingleGen {
    guns: Vec<Gun>,
}

fn vector<T>(params: &ParameterSet, key: &str, n: usize) -> Result<Vec<T>>
where
    Vec<T>: ParamValue,
{
    let values: Vec<T> = params.get(key)?;
    if values.len() != n {
        bail!("{} has {} entries but PDG has {}", key, values.len(), n);
    }
    Ok(values)
}

impl SingleGen {
    pub fn new(ctx: &InitContext<'_>) -> Result<Self> {
        Self::from_params(ctx.params())
            .wrap_err_with(|| format!("Invalid particle gun configuration for '{}'", ctx.label()))
    }

    fn from_params(params: &ParameterSet) -> Result<Self> {
        let pdg: Vec<i32> = params.get("PDG")?;
        let n = pdg.len();

        let f = |key: &str| vector::<f64>(params, key, n);
        let d = |key: &str| -> Result<Vec<Dist>> {
            vector::<i32>(params, key, n)?
                .into_iter()
                .map(|code| Dist::from_code(key, code))
                .collect()
        };

        let (p0, sigma_p, p_dist) = (f("P0")?, f("SigmaP")?, d("PDist")?);
        let (x0, y0, z0, t0) = (f("X0")?, f("Y0")?, f("Z0")?, f("T0")?);
        let (sx, sy, sz, st) = (f("SigmaX")?, f("SigmaY")?, f("SigmaZ")?, f("SigmaT")?);
        let pos_dist = d("PosDist")?;
        let (txz, tyz) = (f("Theta0XZ")?, f("Theta0YZ")?);
        let (stxz, styz) = (f("SigmaThetaXZ")?, f("SigmaThetaYZ")?);
        let angle_dist = d("AngleDist")?;

        let mut guns = Vec::with_capacity(n);
        for i in 0..n {
            let mass = pdg_mass(pdg[i]).ok_or_else(|| eyre!("unknown PDG code {}", pdg[i]))?;
            guns.push(Gun {
                pdg: pdg[i],
                mass,
                p0: p0[i],
                sigma_p: sigma_p[i],
                p_dist: p_dist[i],
                vertex: [x0[i], y0[i], z0[i], t0[i]],
                sigma_vertex: [sx[i], sy[i], sz[i], st[i]],
                pos_dist: pos_dist[i],
                theta0: [txz[i], tyz[i]],
                sigma_theta: [stxz[i], styz[i]],
                angle_dist: angle_dist[i],
            });
        }
        Ok(SingleGen { guns })
    }

    pub fn particle_count(&self) -> usize {
        self.guns.len()
    }
}

impl Producer for SingleGen {
    fn produce(&mut self, event: &mut Event, ctx: &mut ModuleContext<'_>) -> Result<ModuleOutcome> {
        let engine = ctx.engine();
        let particles: Vec<Particle> = self.guns.iter().map(|g| g.fire(engine)).collect();
        debug!("{} generated {} particle(s) for event {}", ctx.label(), particles.len(), event.id());
        event.put(ctx.label(), "", particles)?;
        Ok(ModuleOutcome::Continue)
    }
}
