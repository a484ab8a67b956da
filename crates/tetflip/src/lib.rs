//! Tetrahedral-mesh FLIP Liquid Simulation
//!
//! Particles carry the liquid and its velocity; a static tetrahedral mesh
//! provides the grid onto which velocities are transferred, made
//! divergence-free, and transferred back.
//!
//! # Example
//!
//! ```
//! use tetflip::{SimConfig, TetFlipSimulation};
//!
//! let mut sim = TetFlipSimulation::new(SimConfig::default()).unwrap();
//! assert_eq!(sim.tet_count(), 2560);
//!
//! // Run simulation step
//! sim.step(0.016);
//! assert_eq!(sim.frame(), 1);
//! ```

pub mod advection;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod forces;
pub mod mesh;
pub mod particle;
pub mod pressure;
pub mod spatial_index;
pub mod transfer;

pub use config::{Scenario, SimConfig, SimParams};
pub use diagnostics::{SolveStats, StepStats};
pub use error::{SimError, SimResult};
pub use glam::Vec3;
pub use mesh::{TetMesh, Tetrahedron};
pub use particle::ParticleSet;
pub use pressure::PressureSolver;

use log::{debug, info, warn};

use transfer::TransferBuffers;

/// Tetrahedral FLIP fluid simulation.
pub struct TetFlipSimulation {
    /// Static mesh holding the grid velocity field
    mesh: TetMesh,
    /// All particles in the simulation
    particles: ParticleSet,
    /// Pressure projection bound to `mesh`
    solver: PressureSolver,

    /// Transfer buffers (pre-allocated to avoid per-frame allocation)
    transfer_buffers: TransferBuffers,

    config: SimConfig,

    /// Elapsed simulation time (s)
    time: f64,
    /// Current simulation frame
    frame: u32,
    last_step: StepStats,
}

impl TetFlipSimulation {
    /// Build the mesh and particle buffers, then place the configured scenario.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.params.validate()?;
        config.scenario.validate()?;

        let mesh = TetMesh::new(config.domain_min, config.domain_max, config.resolution)?;
        let particles = ParticleSet::new(config.max_particles);
        let solver = PressureSolver::with_settings(
            &mesh,
            config.params.pressure_iterations,
            config.params.pressure_tolerance,
        );
        let transfer_buffers = TransferBuffers::new(&mesh, config.max_particles);

        info!(
            "tetflip: {} nodes, {} tetrahedra, capacity {} particles",
            mesh.node_count(),
            mesh.tet_count(),
            particles.capacity()
        );

        let mut sim = Self {
            mesh,
            particles,
            solver,
            transfer_buffers,
            config,
            time: 0.0,
            frame: 0,
            last_step: StepStats::default(),
        };
        sim.reset();
        Ok(sim)
    }

    /// Restore the initial particle scenario. The mesh is kept; node
    /// velocities, time, and frame count return to zero.
    pub fn reset(&mut self) {
        let placed = match self.config.scenario.populate(&mut self.particles) {
            Ok(placed) => placed,
            Err(err) => {
                warn!("scenario could not be placed: {}", err);
                self.particles.clear();
                0
            }
        };
        self.mesh.clear_velocities();
        self.time = 0.0;
        self.frame = 0;
        self.last_step = StepStats::default();
        info!("tetflip: reset with {} particles", placed);
    }

    /// Run one simulation step with the configured timestep.
    pub fn update(&mut self) {
        self.step(self.config.params.timestep);
    }

    /// Run one simulation step.
    pub fn step(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            warn!("ignoring step with invalid dt {}", dt);
            return;
        }

        if !self.particles.is_empty() {
            self.last_step = self.run_phases(dt);
        }

        self.time += f64::from(dt);
        self.frame += 1;
    }

    fn run_phases(&mut self, dt: f32) -> StepStats {
        let params = &self.config.params;

        // 1. P2G: Transfer particle velocities to mesh nodes
        let p2g_skipped =
            transfer::particles_to_grid(&mut self.mesh, &self.particles, &mut self.transfer_buffers);

        // 2. Store transferred velocities for the FLIP delta
        self.mesh.store_old_velocities();

        // 3. Apply gravity to node velocities
        forces::apply_gravity(&mut self.mesh, params.gravity, dt);

        // 4. Pressure projection (make velocity divergence-free)
        let solve = match self.solver.project(&mut self.mesh, dt) {
            Ok(stats) => stats,
            Err(err) => {
                warn!("pressure projection skipped: {}", err);
                SolveStats::default()
            }
        };

        // 5. G2P: Transfer mesh velocities back to particles
        let g2p_skipped = transfer::grid_to_particles(&self.mesh, &mut self.particles, params.flip_ratio);

        // 6. Advect particles and bounce them off the domain walls
        advection::advect_particles(&mut self.particles, dt);
        let (min, max) = self.mesh.bounds();
        advection::enforce_particle_boundaries(&mut self.particles, min, max);

        if p2g_skipped > 0 || g2p_skipped > 0 {
            debug!(
                "frame {}: {} particles missed P2G, {} missed G2P",
                self.frame, p2g_skipped, g2p_skipped
            );
        }

        StepStats {
            p2g_skipped,
            g2p_skipped,
            solve,
        }
    }

    // ========== Parameter setters ==========

    pub fn set_timestep(&mut self, dt: f32) -> SimResult<()> {
        config::validate_timestep(dt)?;
        self.config.params.timestep = dt;
        Ok(())
    }

    pub fn set_gravity(&mut self, gravity: f32) -> SimResult<()> {
        config::validate_gravity(gravity)?;
        self.config.params.gravity = gravity;
        Ok(())
    }

    /// Accepted and stored; viscosity is not applied by the solver.
    pub fn set_viscosity(&mut self, viscosity: f32) -> SimResult<()> {
        config::validate_viscosity(viscosity)?;
        self.config.params.viscosity = viscosity;
        Ok(())
    }

    pub fn set_flip_ratio(&mut self, ratio: f32) -> SimResult<()> {
        config::validate_flip_ratio(ratio)?;
        self.config.params.flip_ratio = ratio;
        Ok(())
    }

    /// Replace all parameters at once (validated as a whole).
    pub fn set_params(&mut self, params: SimParams) -> SimResult<()> {
        params.validate()?;
        self.solver.set_max_iterations(params.pressure_iterations);
        self.solver.set_tolerance(params.pressure_tolerance);
        self.config.params = params;
        Ok(())
    }

    // ========== Read-only views ==========

    pub fn params(&self) -> &SimParams {
        &self.config.params
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn mesh(&self) -> &TetMesh {
        &self.mesh
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    /// Mutable particle access for drivers that inject or edit particles.
    pub fn particles_mut(&mut self) -> &mut ParticleSet {
        &mut self.particles
    }

    pub fn particle_positions(&self) -> &[Vec3] {
        self.particles.positions()
    }

    /// Particle positions as a flat xyz buffer for upload to a renderer.
    pub fn particle_positions_flat(&self) -> &[f32] {
        self.particles.positions_flat()
    }

    pub fn node_velocities(&self) -> &[Vec3] {
        self.mesh.velocities()
    }

    pub fn node_velocities_flat(&self) -> &[f32] {
        self.mesh.velocities_flat()
    }

    /// Pressure solver (divergence and pressure of the last step).
    pub fn solver(&self) -> &PressureSolver {
        &self.solver
    }

    pub fn particle_count(&self) -> usize {
        self.particles.count()
    }

    pub fn tet_count(&self) -> usize {
        self.mesh.tet_count()
    }

    /// Elapsed simulation time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Counters from the most recent step that moved particles.
    pub fn last_step(&self) -> &StepStats {
        &self.last_step
    }

    /// World bounds as (min, max) vectors.
    pub fn world_bounds(&self) -> (Vec3, Vec3) {
        self.mesh.bounds()
    }
}
