//! Pressure projection on the tetrahedral mesh.
//!
//! Three phases per call, nothing carried over between calls:
//! 1. Per-node divergence from one-sided differences inside each tetrahedron.
//! 2. Jacobi relaxation of `Laplacian(p) = div * dt` over the node graph.
//! 3. Velocity correction `v -= dt * grad(p)`.

use glam::Vec3;
use log::debug;
use rayon::prelude::*;

use crate::constants::{MIN_DISTANCE, MIN_SPACING, PRESSURE_ITERATIONS, PRESSURE_TOLERANCE};
use crate::diagnostics::SolveStats;
use crate::error::{SimError, SimResult};
use crate::mesh::TetMesh;

/// Jacobi pressure solver bound to one mesh.
///
/// Scratch buffers are sized once for the mesh and overwritten every call.
#[derive(Clone, Debug)]
pub struct PressureSolver {
    node_count: usize,
    max_iterations: usize,
    tolerance: f32,

    tet_divergence: Vec<f32>,
    divergence: Vec<f32>,
    rhs: Vec<f32>,
    pressure: Vec<f32>,
    /// Previous-iteration pressure (Jacobi read buffer)
    pressure_old: Vec<f32>,
    gradient: Vec<Vec3>,
}

impl PressureSolver {
    /// Solver with the default iteration cap (50) and tolerance (1e-4).
    pub fn new(mesh: &TetMesh) -> Self {
        Self::with_settings(mesh, PRESSURE_ITERATIONS, PRESSURE_TOLERANCE)
    }

    pub fn with_settings(mesh: &TetMesh, max_iterations: usize, tolerance: f32) -> Self {
        let n = mesh.node_count();
        Self {
            node_count: n,
            max_iterations,
            tolerance,
            tet_divergence: vec![0.0; mesh.tet_count()],
            divergence: vec![0.0; n],
            rhs: vec![0.0; n],
            pressure: vec![0.0; n],
            pressure_old: vec![0.0; n],
            gradient: vec![Vec3::ZERO; n],
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn set_max_iterations(&mut self, iterations: usize) {
        self.max_iterations = iterations;
    }

    pub fn set_tolerance(&mut self, tolerance: f32) {
        self.tolerance = tolerance;
    }

    /// Per-node divergence from the last call.
    pub fn divergence(&self) -> &[f32] {
        &self.divergence
    }

    /// Per-node pressure from the last call.
    pub fn pressure(&self) -> &[f32] {
        &self.pressure
    }

    fn check_mesh(&self, mesh: &TetMesh) -> SimResult<()> {
        if mesh.node_count() != self.node_count || mesh.tet_count() != self.tet_divergence.len() {
            return Err(SimError::MeshMismatch {
                expected: self.node_count,
                actual: mesh.node_count(),
            });
        }
        Ok(())
    }

    /// Make the mesh velocity field (approximately) divergence-free.
    pub fn project(&mut self, mesh: &mut TetMesh, dt: f32) -> SimResult<SolveStats> {
        self.check_mesh(mesh)?;
        self.compute_divergence(mesh);
        let stats = self.solve_pressure_jacobi(mesh, dt);
        self.apply_pressure_gradient(mesh, dt);

        debug!(
            "pressure solve: {} iterations, final delta {:.3e}, converged {}",
            stats.iterations, stats.final_delta, stats.converged
        );
        Ok(stats)
    }

    /// Per-node divergence estimate.
    ///
    /// Each tetrahedron differences node 0 against nodes 1, 2, 3 along x, y, z.
    /// The scalar is splatted to its 4 nodes; each node averages over its
    /// incident tetrahedra.
    pub fn compute_divergence(&mut self, mesh: &TetMesh) {
        let nodes = mesh.nodes();
        let velocities = mesh.velocities();
        let tetrahedra = mesh.tetrahedra();

        self.tet_divergence
            .par_iter_mut()
            .zip(tetrahedra.par_iter())
            .for_each(|(div, t)| {
                let p = t.map(|n| nodes[n]);
                let v = t.map(|n| velocities[n]);
                *div = one_sided(v[1].x - v[0].x, p[1].x - p[0].x)
                    + one_sided(v[2].y - v[0].y, p[2].y - p[0].y)
                    + one_sided(v[3].z - v[0].z, p[3].z - p[0].z);
            });

        let tet_divergence = &self.tet_divergence;
        self.divergence
            .par_iter_mut()
            .enumerate()
            .for_each(|(node, div)| {
                let incident = mesh.incident_tets(node);
                *div = if incident.is_empty() {
                    0.0
                } else {
                    incident.iter().map(|&t| tet_divergence[t]).sum::<f32>() / incident.len() as f32
                };
            });
    }

    /// Solve `Laplacian(p) = divergence * dt` with Jacobi iteration.
    ///
    /// Node stencil: p = (sum of neighbor p - rhs) / neighbor_count.
    /// Pressure starts from zero. Stops below the tolerance or at the cap.
    pub fn solve_pressure_jacobi(&mut self, mesh: &TetMesh, dt: f32) -> SolveStats {
        self.rhs
            .iter_mut()
            .zip(&self.divergence)
            .for_each(|(rhs, &div)| *rhs = div * dt);
        self.pressure.fill(0.0);

        let mut stats = SolveStats {
            deltas: Vec::with_capacity(self.max_iterations),
            ..SolveStats::default()
        };

        for _ in 0..self.max_iterations {
            // Copy current pressure to the read buffer (true Jacobi, not Gauss-Seidel)
            self.pressure_old.copy_from_slice(&self.pressure);
            let src = &self.pressure_old;
            let rhs = &self.rhs;

            let max_delta = self
                .pressure
                .par_iter_mut()
                .enumerate()
                .map(|(node, p)| {
                    let neighbors = mesh.neighbors(node);
                    if neighbors.is_empty() {
                        return 0.0;
                    }
                    let sum: f32 = neighbors.iter().map(|&n| src[n]).sum();
                    let updated = (sum - rhs[node]) / neighbors.len() as f32;
                    let delta = (updated - *p).abs();
                    *p = updated;
                    delta
                })
                .reduce(|| 0.0, f32::max);

            stats.iterations += 1;
            stats.final_delta = max_delta;
            stats.deltas.push(max_delta);
            if max_delta < self.tolerance {
                stats.converged = true;
                break;
            }
        }

        stats
    }

    /// Subtract `dt * grad(p)` from every node velocity.
    ///
    /// The gradient at a node averages `(p_n - p_i) * (x_n - x_i) / |x_n - x_i|^2`
    /// over its neighbors. Nodes without a usable neighbor are unchanged.
    pub fn apply_pressure_gradient(&mut self, mesh: &mut TetMesh, dt: f32) {
        {
            let nodes = mesh.nodes();
            let pressure = &self.pressure;
            let mesh: &TetMesh = mesh;

            self.gradient
                .par_iter_mut()
                .enumerate()
                .for_each(|(node, grad)| {
                    let x = nodes[node];
                    let p = pressure[node];
                    let mut sum = Vec3::ZERO;
                    let mut count = 0usize;

                    for &n in mesh.neighbors(node) {
                        let offset = nodes[n] - x;
                        let dist_sq = offset.length_squared();
                        if dist_sq < MIN_DISTANCE * MIN_DISTANCE {
                            continue;
                        }
                        sum += offset * ((pressure[n] - p) / dist_sq);
                        count += 1;
                    }

                    *grad = if count > 0 { sum / count as f32 } else { Vec3::ZERO };
                });
        }

        let gradient = &self.gradient;
        mesh.velocities_mut()
            .par_iter_mut()
            .zip(gradient.par_iter())
            .for_each(|(v, &grad)| *v -= grad * dt);
    }
}

/// One-sided difference `dv / dx` with |dx| floored at `MIN_SPACING`.
#[inline]
fn one_sided(dv: f32, dx: f32) -> f32 {
    let h = dx.abs().max(MIN_SPACING);
    if dx < 0.0 {
        -dv / h
    } else {
        dv / h
    }
}
