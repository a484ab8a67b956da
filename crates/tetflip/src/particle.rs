//! Fixed-capacity particle buffers for the tetrahedral FLIP simulation.

use glam::Vec3;
use log::warn;

use crate::error::{SimError, SimResult};

/// Particle positions and velocities in pre-sized buffers.
///
/// Only the first `count` entries are live. Assignments beyond `capacity`
/// are truncated with a warning.
#[derive(Clone, Debug)]
pub struct ParticleSet {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    count: usize,
}

impl ParticleSet {
    /// Create an empty set able to hold `capacity` particles.
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: vec![Vec3::ZERO; capacity],
            velocities: vec![Vec3::ZERO; capacity],
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.positions.len()
    }

    /// Number of live particles.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions[..self.count]
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities[..self.count]
    }

    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        &mut self.positions[..self.count]
    }

    pub fn velocities_mut(&mut self) -> &mut [Vec3] {
        &mut self.velocities[..self.count]
    }

    /// Live positions as a flat `[x0, y0, z0, x1, ...]` view.
    pub fn positions_flat(&self) -> &[f32] {
        bytemuck::cast_slice(self.positions())
    }

    /// Live velocities as a flat `[x0, y0, z0, x1, ...]` view.
    pub fn velocities_flat(&self) -> &[f32] {
        bytemuck::cast_slice(self.velocities())
    }

    /// Positions (read) and velocities (write) of the live particles.
    pub fn split_mut(&mut self) -> (&[Vec3], &mut [Vec3]) {
        (&self.positions[..self.count], &mut self.velocities[..self.count])
    }

    /// Positions (write) and velocities (write) of the live particles.
    pub fn split_both_mut(&mut self) -> (&mut [Vec3], &mut [Vec3]) {
        (&mut self.positions[..self.count], &mut self.velocities[..self.count])
    }

    /// Replace particle positions from a flat xyz buffer and set the live count.
    ///
    /// Returns the number of particles stored.
    pub fn set_positions(&mut self, flat: &[f32]) -> SimResult<usize> {
        let stored = copy_flat("positions", flat, &mut self.positions)?;
        self.count = stored;
        Ok(stored)
    }

    /// Replace particle velocities from a flat xyz buffer. The live count is unchanged.
    ///
    /// Returns the number of velocities stored.
    pub fn set_velocities(&mut self, flat: &[f32]) -> SimResult<usize> {
        copy_flat("velocities", flat, &mut self.velocities)
    }

    /// Append one particle. Returns `false` when the set is full.
    pub fn push(&mut self, position: Vec3, velocity: Vec3) -> bool {
        if self.is_full() {
            return false;
        }
        self.positions[self.count] = position;
        self.velocities[self.count] = velocity;
        self.count += 1;
        true
    }

    /// Drop all live particles. Capacity is kept.
    pub fn clear(&mut self) {
        self.count = 0;
    }
}

fn copy_flat(what: &'static str, flat: &[f32], dst: &mut [Vec3]) -> SimResult<usize> {
    if flat.len() % 3 != 0 {
        return Err(SimError::FlatBufferLength { len: flat.len() });
    }

    let requested = flat.len() / 3;
    let stored = requested.min(dst.len());
    if requested > stored {
        warn!(
            "particle {} truncated: {} supplied, capacity {} ({} dropped)",
            what,
            requested,
            dst.len(),
            requested - stored
        );
    }

    for (slot, xyz) in dst.iter_mut().zip(flat.chunks_exact(3)) {
        *slot = Vec3::new(xyz[0], xyz[1], xyz[2]);
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_set_creation() {
        let particles = ParticleSet::new(16);
        assert_eq!(particles.capacity(), 16);
        assert_eq!(particles.count(), 0);
        assert!(particles.is_empty());
    }

    #[test]
    fn test_set_positions_sets_count() {
        let mut particles = ParticleSet::new(4);
        let stored = particles
            .set_positions(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap();
        assert_eq!(stored, 2);
        assert_eq!(particles.count(), 2);
        assert_eq!(particles.positions()[1], Vec3::new(3.0, 4.0, 5.0));
        assert_eq!(particles.positions_flat(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_set_positions_truncates_to_capacity() {
        let mut particles = ParticleSet::new(2);
        let flat: Vec<f32> = (0..7 * 3).map(|i| i as f32).collect();
        let stored = particles.set_positions(&flat).unwrap();
        assert_eq!(stored, 2);
        assert_eq!(particles.count(), 2);
    }

    #[test]
    fn test_set_velocities_keeps_count() {
        let mut particles = ParticleSet::new(3);
        particles.set_positions(&[0.0; 6]).unwrap();
        let stored = particles.set_velocities(&[1.0; 9]).unwrap();
        assert_eq!(stored, 3);
        assert_eq!(particles.count(), 2);
        assert_eq!(particles.velocities(), &[Vec3::ONE, Vec3::ONE]);
    }

    #[test]
    fn test_ragged_buffer_rejected() {
        let mut particles = ParticleSet::new(3);
        let err = particles.set_positions(&[0.0; 4]).unwrap_err();
        assert_eq!(err, SimError::FlatBufferLength { len: 4 });
        assert_eq!(particles.count(), 0);
    }

    #[test]
    fn test_push_until_full() {
        let mut particles = ParticleSet::new(2);
        assert!(particles.push(Vec3::ONE, Vec3::ZERO));
        assert!(particles.push(Vec3::ONE, Vec3::ZERO));
        assert!(!particles.push(Vec3::ONE, Vec3::ZERO));
        assert_eq!(particles.count(), 2);
        particles.clear();
        assert!(particles.is_empty());
        assert_eq!(particles.capacity(), 2);
    }
}
