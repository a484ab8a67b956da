//! Particle advection and domain-wall collision.

use glam::Vec3;
use rayon::prelude::*;

use crate::constants::RESTITUTION;
use crate::particle::ParticleSet;

/// Advect particles using explicit Euler integration.
pub fn advect_particles(particles: &mut ParticleSet, dt: f32) {
    let (positions, velocities) = particles.split_both_mut();
    positions
        .par_iter_mut()
        .zip(velocities.par_iter())
        .for_each(|(x, &v)| *x += v * dt);
}

/// Clamp particles to the domain box and bounce them off the walls.
///
/// Every axis is resolved independently: below `min` the velocity becomes
/// `|v| * restitution`, above `max` it becomes `-|v| * restitution`.
pub fn enforce_particle_boundaries(particles: &mut ParticleSet, min: Vec3, max: Vec3) {
    let (positions, velocities) = particles.split_both_mut();
    positions
        .par_iter_mut()
        .zip(velocities.par_iter_mut())
        .for_each(|(x, v)| {
            collide_axis(&mut x.x, &mut v.x, min.x, max.x);
            collide_axis(&mut x.y, &mut v.y, min.y, max.y);
            collide_axis(&mut x.z, &mut v.z, min.z, max.z);
        });
}

#[inline]
fn collide_axis(x: &mut f32, v: &mut f32, min: f32, max: f32) {
    if *x < min {
        *x = min;
        *v = v.abs() * RESTITUTION;
    } else if *x > max {
        *x = max;
        *v = -v.abs() * RESTITUTION;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advection() {
        let mut particles = ParticleSet::new(1);
        particles.push(Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 2.0, 3.0));

        advect_particles(&mut particles, 0.5);

        let p = particles.positions()[0];
        assert!((p.x - 1.5).abs() < 1e-6);
        assert!((p.y - 2.0).abs() < 1e-6);
        assert!((p.z - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_high_side_reflects() {
        let mut particles = ParticleSet::new(1);
        particles.push(Vec3::new(1.2, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0));

        enforce_particle_boundaries(&mut particles, Vec3::splat(-1.0), Vec3::ONE);

        assert_eq!(particles.positions()[0].x, 1.0);
        assert_eq!(particles.velocities()[0].x, -2.0 * RESTITUTION);
    }

    #[test]
    fn test_low_side_reflects_even_when_moving_out() {
        let mut particles = ParticleSet::new(1);
        particles.push(Vec3::new(0.0, -1.5, 0.0), Vec3::new(0.0, -4.0, 0.0));

        enforce_particle_boundaries(&mut particles, Vec3::splat(-1.0), Vec3::ONE);

        assert_eq!(particles.positions()[0].y, -1.0);
        assert!((particles.velocities()[0].y - 4.0 * RESTITUTION).abs() < 1e-6);
    }

    #[test]
    fn test_axes_resolved_independently() {
        let mut particles = ParticleSet::new(1);
        particles.push(Vec3::new(2.0, -2.0, 0.5), Vec3::new(1.0, -1.0, 7.0));

        enforce_particle_boundaries(&mut particles, Vec3::splat(-1.0), Vec3::ONE);

        assert_eq!(particles.positions()[0], Vec3::new(1.0, -1.0, 0.5));
        let v = particles.velocities()[0];
        assert!((v.x + RESTITUTION).abs() < 1e-6);
        assert!((v.y - RESTITUTION).abs() < 1e-6);
        assert_eq!(v.z, 7.0, "in-bounds axis keeps its velocity");
    }
}
