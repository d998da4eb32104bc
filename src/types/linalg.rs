//! Fixed-size vector and matrix aliases used by the heading filter.

use nalgebra::{Matrix3, Vector3};

/// Tri-axis sensor vector (x, y, z)
pub type Vec3 = Vector3<f64>;

/// 3×3 rotation / inclination matrix
pub type Mat3 = Matrix3<f64>;

/// Standard gravity in m/s²
pub const STANDARD_GRAVITY: f64 = 9.806_65;
