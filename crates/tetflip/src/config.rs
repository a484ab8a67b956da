//! Simulation configuration: tunable parameters, domain, and initial scenario.

use glam::Vec3;
use log::warn;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DAM_BREAK_MAX, DAM_BREAK_MIN, DAM_BREAK_SEED, DEFAULT_MAX_PARTICLES, DEFAULT_RESOLUTION,
    DEFAULT_TIMESTEP, GRAVITY, MAX_GRAVITY, MAX_TIMESTEP, PRESSURE_ITERATIONS, PRESSURE_TOLERANCE,
};
use crate::error::{SimError, SimResult};
use crate::particle::ParticleSet;

/// Live-tunable simulation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Timestep used by `update()` (s)
    pub timestep: f32,
    /// Vertical gravity (m/s^2, negative = down)
    pub gravity: f32,
    /// Kinematic viscosity. Stored for drivers; not applied by the solver yet.
    pub viscosity: f32,
    /// FLIP/PIC blend (0.0 = replace with grid velocity, 1.0 = pure FLIP)
    pub flip_ratio: f32,
    /// Jacobi iteration cap
    pub pressure_iterations: usize,
    /// Jacobi convergence threshold on the max per-node change
    pub pressure_tolerance: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            timestep: DEFAULT_TIMESTEP,
            gravity: GRAVITY,
            viscosity: 0.0,
            flip_ratio: 0.0,
            pressure_iterations: PRESSURE_ITERATIONS,
            pressure_tolerance: PRESSURE_TOLERANCE,
        }
    }
}

impl SimParams {
    pub fn validate(&self) -> SimResult<()> {
        validate_timestep(self.timestep)?;
        validate_gravity(self.gravity)?;
        validate_viscosity(self.viscosity)?;
        validate_flip_ratio(self.flip_ratio)?;
        if self.pressure_iterations == 0 {
            return Err(SimError::parameter(
                "pressure_iterations",
                0.0,
                "at least one iteration is required",
            ));
        }
        if !(self.pressure_tolerance.is_finite() && self.pressure_tolerance > 0.0) {
            return Err(SimError::parameter(
                "pressure_tolerance",
                self.pressure_tolerance,
                "must be finite and positive",
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_timestep(dt: f32) -> SimResult<()> {
    if dt.is_finite() && dt > 0.0 && dt <= MAX_TIMESTEP {
        Ok(())
    } else {
        Err(SimError::parameter("timestep", dt, "must be in (0, 0.1]"))
    }
}

pub(crate) fn validate_gravity(gravity: f32) -> SimResult<()> {
    if gravity.is_finite() && gravity.abs() <= MAX_GRAVITY {
        Ok(())
    } else {
        Err(SimError::parameter("gravity", gravity, "must be finite with |g| <= 1000"))
    }
}

pub(crate) fn validate_viscosity(viscosity: f32) -> SimResult<()> {
    if viscosity.is_finite() && viscosity >= 0.0 {
        Ok(())
    } else {
        Err(SimError::parameter("viscosity", viscosity, "must be finite and non-negative"))
    }
}

pub(crate) fn validate_flip_ratio(ratio: f32) -> SimResult<()> {
    if (0.0..=1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(SimError::parameter("flip_ratio", ratio, "must be in [0, 1]"))
    }
}

/// Initial particle placement, replayed on every reset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Scenario {
    /// `count` particles uniformly scattered in a box with a seeded RNG.
    DamBreak {
        region_min: Vec3,
        region_max: Vec3,
        count: usize,
        seed: u64,
    },
    /// Regular lattice fill of a box, one particle per `spacing`.
    Block { min: Vec3, max: Vec3, spacing: f32 },
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario::DamBreak {
            region_min: Vec3::from_array(DAM_BREAK_MIN),
            region_max: Vec3::from_array(DAM_BREAK_MAX),
            count: DEFAULT_MAX_PARTICLES,
            seed: DAM_BREAK_SEED,
        }
    }
}

impl Scenario {
    pub fn validate(&self) -> SimResult<()> {
        match *self {
            Scenario::DamBreak {
                region_min,
                region_max,
                count,
                ..
            } => {
                if count == 0 {
                    return Err(SimError::EmptyRegion("dam break with zero particles"));
                }
                if !valid_box(region_min, region_max) {
                    return Err(SimError::EmptyRegion("dam break region has no volume"));
                }
            }
            Scenario::Block { min, max, spacing } => {
                if !(spacing.is_finite() && spacing > 0.0) {
                    return Err(SimError::parameter("spacing", spacing, "must be finite and positive"));
                }
                if !valid_box(min, max) {
                    return Err(SimError::EmptyRegion("block region has no volume"));
                }
                self.particle_count()?;
            }
        }
        Ok(())
    }

    /// Number of particles this scenario describes.
    pub fn particle_count(&self) -> SimResult<usize> {
        match *self {
            Scenario::DamBreak { count, .. } => Ok(count),
            Scenario::Block { min, max, spacing } => {
                let [nx, ny, nz] = block_dims(min, max, spacing)?;
                nx.checked_mul(ny)
                    .and_then(|n| n.checked_mul(nz))
                    .ok_or_else(|| SimError::parameter("spacing", spacing, "block lattice has too many points"))
            }
        }
    }

    /// Flat xyz positions of the first `limit` particles of this scenario.
    pub fn positions(&self, limit: usize) -> SimResult<Vec<f32>> {
        let total = self.particle_count()?;
        let placed = total.min(limit);
        let len = placed
            .checked_mul(3)
            .ok_or_else(|| SimError::parameter("count", placed as f32, "too many particles to place"))?;
        let mut flat = Vec::with_capacity(len);

        match *self {
            Scenario::DamBreak {
                region_min,
                region_max,
                seed,
                ..
            } => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let extent = region_max - region_min;
                for _ in 0..placed {
                    let offset = Vec3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>());
                    flat.extend_from_slice(&(region_min + extent * offset).to_array());
                }
            }
            Scenario::Block { min, max, spacing } => {
                let [nx, ny, _] = block_dims(min, max, spacing)?;
                for n in 0..placed {
                    let (i, j, k) = (n % nx, (n / nx) % ny, n / (nx * ny));
                    let p = min + Vec3::new(i as f32, j as f32, k as f32) * spacing;
                    flat.extend_from_slice(&p.to_array());
                }
            }
        }
        Ok(flat)
    }

    /// Replace the particle state with this scenario (zero velocity).
    ///
    /// Particles beyond the set's capacity are dropped with a warning.
    /// Returns the number of particles placed.
    pub fn populate(&self, particles: &mut ParticleSet) -> SimResult<usize> {
        let total = self.particle_count()?;
        if total > particles.capacity() {
            warn!(
                "scenario positions truncated: {} requested, capacity {}",
                total,
                particles.capacity()
            );
        }
        let positions = self.positions(particles.capacity())?;
        let placed = particles.set_positions(&positions)?;
        particles.set_velocities(&vec![0.0; positions.len()])?;
        Ok(placed)
    }
}

/// Lattice points per axis for a block fill.
fn block_dims(min: Vec3, max: Vec3, spacing: f32) -> SimResult<[usize; 3]> {
    let steps = ((max - min) / spacing).floor();
    let mut dims = [0; 3];
    for (dim, step) in dims.iter_mut().zip(steps.to_array()) {
        if !(step.is_finite() && step >= 0.0 && step < u32::MAX as f32) {
            return Err(SimError::parameter("spacing", spacing, "block lattice has too many points"));
        }
        *dim = step as usize + 1;
    }
    Ok(dims)
}

fn valid_box(min: Vec3, max: Vec3) -> bool {
    min.is_finite() && max.is_finite() && min.cmplt(max).all()
}

/// Everything needed to build a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub domain_min: Vec3,
    pub domain_max: Vec3,
    /// Mesh cells per axis
    pub resolution: (usize, usize, usize),
    /// Particle buffer capacity
    pub max_particles: usize,
    pub scenario: Scenario,
    pub params: SimParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            domain_min: Vec3::splat(-1.0),
            domain_max: Vec3::ONE,
            resolution: (DEFAULT_RESOLUTION, DEFAULT_RESOLUTION, DEFAULT_RESOLUTION),
            max_particles: DEFAULT_MAX_PARTICLES,
            scenario: Scenario::default(),
            params: SimParams::default(),
        }
    }
}
