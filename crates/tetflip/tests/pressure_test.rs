//! Pressure solver tests
//!
//! Tests divergence assembly, Jacobi convergence behavior, and the gradient
//! correction on the tetrahedral mesh.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tetflip::diagnostics::mean_abs_divergence;
use tetflip::{PressureSolver, TetMesh, Vec3};

const DT: f32 = 0.016;

fn unit_mesh(n: usize) -> TetMesh {
    TetMesh::new(Vec3::splat(-1.0), Vec3::ONE, (n, n, n)).unwrap()
}

fn randomize_velocities(mesh: &mut TetMesh, seed: u64, scale: f32) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for v in mesh.velocities_mut() {
        *v = Vec3::new(
            rng.gen_range(-scale..scale),
            rng.gen_range(-scale..scale),
            rng.gen_range(-scale..scale),
        );
    }
}

/// Max per-node change never grows between Jacobi iterations
#[test]
fn test_jacobi_delta_non_increasing() {
    for seed in [3, 17, 99] {
        let mut mesh = unit_mesh(6);
        randomize_velocities(&mut mesh, seed, 2.0);
        let mut solver = PressureSolver::new(&mesh);

        solver.compute_divergence(&mesh);
        let stats = solver.solve_pressure_jacobi(&mesh, DT);

        assert!(stats.iterations >= 1 && stats.iterations <= 50);
        assert_eq!(stats.deltas.len(), stats.iterations);
        for pair in stats.deltas.windows(2) {
            assert!(
                pair[1] <= pair[0] * (1.0 + 1e-4) + 1e-7,
                "seed {}: delta grew from {} to {}",
                seed,
                pair[0],
                pair[1]
            );
        }
    }
}

/// The iteration cap bounds the work even when the tolerance is unreachable
#[test]
fn test_iteration_cap_respected() {
    let mut mesh = unit_mesh(5);
    randomize_velocities(&mut mesh, 5, 10.0);
    let mut solver = PressureSolver::with_settings(&mesh, 7, 0.0);

    let stats = solver.project(&mut mesh, DT).unwrap();
    assert_eq!(stats.iterations, 7);
    assert!(!stats.converged);
}

/// A loose tolerance stops early and reports convergence
#[test]
fn test_tolerance_stops_early() {
    let mut mesh = unit_mesh(5);
    randomize_velocities(&mut mesh, 8, 0.5);
    let mut solver = PressureSolver::with_settings(&mesh, 50, 1.0);

    let stats = solver.project(&mut mesh, DT).unwrap();
    assert!(stats.converged);
    assert!(stats.iterations < 50);
    assert!(stats.final_delta < 1.0);
}

/// Pressure stays zero and velocities untouched for a uniform flow
#[test]
fn test_uniform_flow_is_left_alone() {
    let mut mesh = unit_mesh(4);
    mesh.velocities_mut().fill(Vec3::new(0.3, -0.2, 0.1));
    let mut solver = PressureSolver::new(&mesh);

    let stats = solver.project(&mut mesh, DT).unwrap();
    assert!(stats.converged);
    assert!(solver.pressure().iter().all(|p| p.abs() < 1e-6));
    for v in mesh.velocities() {
        assert!((*v - Vec3::new(0.3, -0.2, 0.1)).length() < 1e-5);
    }
}

/// Projection of a compressive field changes velocities and keeps them finite
#[test]
fn test_projection_changes_divergent_field() {
    let mut mesh = unit_mesh(6);
    let nodes = mesh.nodes().to_vec();
    for (v, x) in mesh.velocities_mut().iter_mut().zip(&nodes) {
        *v = -*x;
    }
    let before = mesh.velocities().to_vec();
    let mut solver = PressureSolver::new(&mesh);

    solver.project(&mut mesh, DT).unwrap();
    assert!(mean_abs_divergence(solver.divergence()) > 0.0);
    assert!(mesh.velocities().iter().all(|v| v.is_finite()));
    let changed = mesh
        .velocities()
        .iter()
        .zip(&before)
        .any(|(a, b)| (*a - *b).length() > 1e-7);
    assert!(changed, "pressure correction should modify a compressive field");
}

/// Solver state does not leak between calls
#[test]
fn test_projection_is_stateless_between_calls() {
    let mut mesh = unit_mesh(4);
    randomize_velocities(&mut mesh, 11, 1.0);
    let snapshot = mesh.velocities().to_vec();

    let mut solver = PressureSolver::new(&mesh);
    let first = solver.project(&mut mesh, DT).unwrap();
    let first_pressure = solver.pressure().to_vec();

    mesh.velocities_mut().copy_from_slice(&snapshot);
    let second = solver.project(&mut mesh, DT).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_pressure, solver.pressure());
}
