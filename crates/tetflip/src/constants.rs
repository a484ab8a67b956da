//! Physical constants and numerical guards for the tetrahedral FLIP kernel.
//!
//! ## Numerical floors
//!
//! The mesh operators divide by volumes, spacings, and distances that can
//! collapse on degenerate geometry. Each of those divisions is guarded by one
//! of the floors below instead of failing.

/// Gravity acceleration (m/s^2) - negative Y direction
pub const GRAVITY: f32 = -9.8;

/// Default simulation timestep (s)
pub const DEFAULT_TIMESTEP: f32 = 0.016;

/// Largest timestep accepted by the parameter setters (s)
pub const MAX_TIMESTEP: f32 = 0.1;

/// Largest gravity magnitude accepted by the parameter setters (m/s^2)
pub const MAX_GRAVITY: f32 = 1000.0;

/// Fraction of normal velocity kept (with sign flip) after hitting a wall
pub const RESTITUTION: f32 = 0.3;

// =============================================================================
// MESH GUARDS
// =============================================================================

/// Tetrahedra with |volume| below this are degenerate.
pub const DEGENERATE_VOLUME: f32 = 1e-10;

/// Slack on barycentric containment so points on shared faces and on the
/// domain hull still locate after f32 rounding.
pub const CONTAINMENT_EPSILON: f32 = 1e-6;

// =============================================================================
// PRESSURE SOLVER
// =============================================================================

/// Minimum vertex spacing used by the one-sided divergence differences.
pub const MIN_SPACING: f32 = 0.1;

/// Neighbor pairs closer than this are skipped by the gradient estimate.
pub const MIN_DISTANCE: f32 = 1e-10;

/// Jacobi iteration cap
pub const PRESSURE_ITERATIONS: usize = 50;

/// Jacobi stops once the max per-node pressure change drops below this.
pub const PRESSURE_TOLERANCE: f32 = 1e-4;

// =============================================================================
// DEFAULT SCENARIO (dam break in [-1, 1]^3)
// =============================================================================

/// Default mesh resolution per axis
pub const DEFAULT_RESOLUTION: usize = 8;

/// Default particle capacity
pub const DEFAULT_MAX_PARTICLES: usize = 1000;

/// Lower corner of the dam-break water column
pub const DAM_BREAK_MIN: [f32; 3] = [-0.8, -0.8, -0.3];

/// Upper corner of the dam-break water column
pub const DAM_BREAK_MAX: [f32; 3] = [-0.4, 0.4, 0.3];

/// Seed for reproducible dam-break placement
pub const DAM_BREAK_SEED: u64 = 0x5EED_F11B;
