//! Particle-mesh transfer functions for tetrahedral FLIP.
//!
//! P2G: Scatter particle velocity onto the 4 nodes of the containing
//!      tetrahedron with barycentric weights, then normalize per node.
//! G2P: Interpolate node velocities back at each particle's barycentric
//!      location.

use glam::Vec3;
use rayon::prelude::*;

use crate::mesh::TetMesh;
use crate::particle::ParticleSet;

/// Pre-allocated buffers for P2G transfer (avoids allocation each frame).
pub struct TransferBuffers {
    /// Per-node accumulated barycentric weight
    pub weight: Vec<f32>,
    /// Per-particle location found during P2G
    locations: Vec<Option<(usize, [f32; 4])>>,
}

impl TransferBuffers {
    /// Create buffers sized for the given mesh and particle capacity.
    pub fn new(mesh: &TetMesh, particle_capacity: usize) -> Self {
        Self {
            weight: vec![0.0; mesh.node_count()],
            locations: vec![None; particle_capacity],
        }
    }

    pub fn clear(&mut self) {
        self.weight.fill(0.0);
    }
}

/// Transfer particle velocities to mesh nodes (P2G).
///
/// Node velocities are rebuilt from scratch. Particles outside every
/// tetrahedron contribute nothing. Nodes that receive no weight stay at zero.
///
/// Returns the number of particles that could not be located.
pub fn particles_to_grid(mesh: &mut TetMesh, particles: &ParticleSet, buffers: &mut TransferBuffers) -> usize {
    buffers.clear();
    mesh.velocities_mut().fill(Vec3::ZERO);

    let count = particles.count();
    if buffers.locations.len() < count {
        buffers.locations.resize(count, None);
    }

    // Locate in parallel; scatter serially (nodes are shared between particles).
    let locations = &mut buffers.locations[..count];
    {
        let mesh: &TetMesh = mesh;
        locations
            .par_iter_mut()
            .zip(particles.positions().par_iter())
            .for_each(|(slot, &position)| *slot = mesh.locate_weighted(position));
    }

    let mut skipped = 0;
    for (location, &velocity) in locations.iter().zip(particles.velocities()) {
        let Some((tet, weights)) = *location else {
            skipped += 1;
            continue;
        };
        let nodes = mesh.tetrahedron(tet);
        let node_velocities = mesh.velocities_mut();
        for (&node, &w) in nodes.iter().zip(&weights) {
            node_velocities[node] += velocity * w;
            buffers.weight[node] += w;
        }
    }

    let weight = &buffers.weight;
    mesh.velocities_mut()
        .par_iter_mut()
        .zip(weight.par_iter())
        .for_each(|(v, &w)| {
            if w > 0.0 {
                *v /= w;
            }
        });

    skipped
}

/// Transfer mesh velocities back to particles (G2P).
///
/// With `flip_ratio == 0.0` the particle velocity is replaced by the
/// interpolated node velocity (pure PIC). A positive ratio blends in the FLIP
/// update `v_particle + (v_grid - v_grid_old)`, using the snapshot taken by
/// [`TetMesh::store_old_velocities`].
///
/// Particles outside every tetrahedron keep their velocity. Returns how many
/// were skipped.
pub fn grid_to_particles(mesh: &TetMesh, particles: &mut ParticleSet, flip_ratio: f32) -> usize {
    let flip_ratio = flip_ratio.clamp(0.0, 1.0);
    let (positions, velocities) = particles.split_mut();

    velocities
        .par_iter_mut()
        .zip(positions.par_iter())
        .map(|(velocity, &position)| {
            let Some((tet, weights)) = mesh.locate_weighted(position) else {
                return 1usize;
            };
            let grid_velocity = mesh.interpolate(mesh.velocities(), tet, &weights);
            if flip_ratio > 0.0 {
                let old_grid_velocity = mesh.interpolate(mesh.old_velocities(), tet, &weights);
                let flip_velocity = *velocity + (grid_velocity - old_grid_velocity);
                *velocity = grid_velocity.lerp(flip_velocity, flip_ratio);
            } else {
                *velocity = grid_velocity;
            }
            0
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(n: usize) -> (TetMesh, ParticleSet) {
        let mesh = TetMesh::new(Vec3::splat(-1.0), Vec3::ONE, (n, n, n)).unwrap();
        (mesh, ParticleSet::new(8))
    }

    #[test]
    fn test_single_particle_p2g_weights() {
        let (mut mesh, mut particles) = setup(2);
        particles.push(Vec3::new(0.3, 0.4, 0.2), Vec3::new(1.0, 0.0, 0.0));
        let mut buffers = TransferBuffers::new(&mesh, particles.capacity());

        let skipped = particles_to_grid(&mut mesh, &particles, &mut buffers);
        assert_eq!(skipped, 0);

        // Weighted average of a single particle is that particle's velocity.
        let touched: Vec<usize> = (0..mesh.node_count()).filter(|&n| buffers.weight[n] > 0.0).collect();
        assert!(!touched.is_empty() && touched.len() <= 4);
        for n in touched {
            assert!((mesh.velocities()[n] - Vec3::X).length() < 1e-5);
        }
        let total: f32 = buffers.weight.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_p2g_resets_previous_field() {
        let (mut mesh, particles) = setup(2);
        mesh.velocities_mut().fill(Vec3::ONE);
        let mut buffers = TransferBuffers::new(&mesh, particles.capacity());
        particles_to_grid(&mut mesh, &particles, &mut buffers);
        assert!(mesh.velocities().iter().all(|v| *v == Vec3::ZERO));
    }

    #[test]
    fn test_p2g_skips_outside_particles() {
        let (mut mesh, mut particles) = setup(2);
        particles.push(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE);
        let mut buffers = TransferBuffers::new(&mesh, particles.capacity());
        let skipped = particles_to_grid(&mut mesh, &particles, &mut buffers);
        assert_eq!(skipped, 1);
        assert!(buffers.weight.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_g2p_pic_replaces_velocity() {
        let (mut mesh, mut particles) = setup(2);
        mesh.velocities_mut().fill(Vec3::new(0.0, -1.0, 2.0));
        particles.push(Vec3::new(0.1, 0.1, 0.1), Vec3::new(9.0, 9.0, 9.0));

        let skipped = grid_to_particles(&mesh, &mut particles, 0.0);
        assert_eq!(skipped, 0);
        assert!((particles.velocities()[0] - Vec3::new(0.0, -1.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn test_g2p_flip_keeps_particle_velocity_plus_delta() {
        let (mut mesh, mut particles) = setup(2);
        mesh.store_old_velocities();
        mesh.velocities_mut().fill(Vec3::new(0.0, -0.5, 0.0));
        particles.push(Vec3::new(0.1, 0.1, 0.1), Vec3::new(2.0, 0.0, 0.0));

        grid_to_particles(&mesh, &mut particles, 1.0);
        assert!((particles.velocities()[0] - Vec3::new(2.0, -0.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_g2p_outside_particle_unchanged() {
        let (mut mesh, mut particles) = setup(2);
        mesh.velocities_mut().fill(Vec3::ONE);
        particles.push(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.5, 0.5, 0.5));
        let skipped = grid_to_particles(&mesh, &mut particles, 0.0);
        assert_eq!(skipped, 1);
        assert_eq!(particles.velocities()[0], Vec3::splat(0.5));
    }
}
