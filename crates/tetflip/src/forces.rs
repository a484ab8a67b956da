//! Body forces applied to mesh node velocities.

use glam::Vec3;
use rayon::prelude::*;

use crate::mesh::TetMesh;

/// Add `gravity * dt` to the Y velocity of every node (uniform density).
pub fn apply_gravity(mesh: &mut TetMesh, gravity: f32, dt: f32) {
    let dv = gravity * dt;
    mesh.velocities_mut().par_iter_mut().for_each(|v| v.y += dv);
}

/// Add `force(position) * dt` to every node velocity.
pub fn apply_body_force<F>(mesh: &mut TetMesh, dt: f32, force: F)
where
    F: Fn(Vec3) -> Vec3 + Sync,
{
    let (nodes, velocities) = mesh.split_velocities_mut();
    velocities
        .par_iter_mut()
        .zip(nodes.par_iter())
        .for_each(|(v, &x)| *v += force(x) * dt);
}
