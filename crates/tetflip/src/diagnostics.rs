//! Diagnostics for monitoring simulation health.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::mesh::TetMesh;
use crate::particle::ParticleSet;

/// Outcome of one Jacobi pressure solve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveStats {
    /// Iterations actually run
    pub iterations: usize,
    /// Max per-node pressure change of the last iteration
    pub final_delta: f32,
    /// Whether `final_delta` dropped below the tolerance
    pub converged: bool,
    /// Max per-node change after each iteration
    pub deltas: Vec<f32>,
}

/// Per-step counters kept by the simulation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    /// Particles outside every tetrahedron during P2G
    pub p2g_skipped: usize,
    /// Particles outside every tetrahedron during G2P
    pub g2p_skipped: usize,
    pub solve: SolveStats,
}

/// Largest particle speed.
pub fn max_particle_speed(particles: &ParticleSet) -> f32 {
    particles
        .velocities()
        .iter()
        .map(|v| v.length())
        .fold(0.0, f32::max)
}

/// Largest node speed.
pub fn max_node_speed(mesh: &TetMesh) -> f32 {
    mesh.velocities()
        .iter()
        .map(|v| v.length())
        .fold(0.0, f32::max)
}

/// Mean particle position, or `None` without particles.
pub fn particle_centroid(particles: &ParticleSet) -> Option<Vec3> {
    if particles.is_empty() {
        return None;
    }
    let sum: Vec3 = particles.positions().iter().copied().sum();
    Some(sum / particles.count() as f32)
}

/// Whether every particle position and velocity is finite.
pub fn all_finite(particles: &ParticleSet) -> bool {
    particles
        .positions()
        .iter()
        .chain(particles.velocities())
        .all(|v| v.is_finite())
}

/// Mean absolute value of a per-node divergence field.
pub fn mean_abs_divergence(divergence: &[f32]) -> f32 {
    if divergence.is_empty() {
        return 0.0;
    }
    divergence.iter().map(|d| d.abs()).sum::<f32>() / divergence.len() as f32
}
