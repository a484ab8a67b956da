//! Error type for mesh construction and simulation configuration.
//!
//! Physical edge cases (degenerate tetrahedra, unlocated particles, empty
//! nodes) never surface here; they are resolved inside the operators.

use glam::Vec3;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Mesh resolution with zero cells on some axis
    #[error("invalid mesh resolution ({nx}, {ny}, {nz}): every axis needs at least one cell")]
    InvalidResolution { nx: usize, ny: usize, nz: usize },

    /// Domain box that is empty, inverted, or not finite
    #[error("invalid domain bounds: min {min} must be finite and strictly below max {max}")]
    InvalidDomain { min: Vec3, max: Vec3 },

    /// Out-of-range simulation parameter
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f32,
        reason: &'static str,
    },

    /// Flat xyz buffer whose length is not a multiple of 3
    #[error("flat vector buffer has length {len}, expected a multiple of 3")]
    FlatBufferLength { len: usize },

    /// Pressure solver applied to a mesh it was not built for
    #[error("pressure solver built for {expected} nodes, mesh has {actual}")]
    MeshMismatch { expected: usize, actual: usize },

    /// Particle scenario whose region has no volume or no particles
    #[error("scenario region is empty: {0}")]
    EmptyRegion(&'static str),
}

impl SimError {
    pub(crate) fn parameter(name: &'static str, value: f32, reason: &'static str) -> Self {
        SimError::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}
