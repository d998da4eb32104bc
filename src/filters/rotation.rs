//! Rotation matrix from gravity and geomagnetic vectors.
//!
//! The world frame is East-North-Up: row 0 of the rotation matrix points
//! east, row 1 magnetic north, row 2 towards the sky.

use crate::types::{Mat3, Vec3, STANDARD_GRAVITY};

/// Smallest accepted |E × A|; below this the field and gravity are
/// close to parallel and the horizontal direction is undefined.
const MIN_HORIZONTAL_NORM: f64 = 0.1;

/// Rotation and inclination matrices for one gravity/field pair
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationSolution {
    pub rotation: Mat3,
    pub inclination: Mat3,
}

/// Device orientation angles in radians
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    /// Rotation around -Z, 0 when the device's Y axis points to magnetic north
    pub azimuth: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Build the rotation matrix from a gravity estimate and a geomagnetic estimate.
///
/// Returns `None` when the device is in free fall or when the two vectors
/// are degenerate (parallel, zero, or non-finite).
pub fn rotation_matrix(gravity: &Vec3, geomagnetic: &Vec3) -> Option<RotationSolution> {
    let free_fall_sq = 0.01 * STANDARD_GRAVITY * STANDARD_GRAVITY;
    let norm_sq_a = gravity.norm_squared();
    if !norm_sq_a.is_finite() || norm_sq_a < free_fall_sq {
        return None;
    }

    let h = geomagnetic.cross(gravity);
    let norm_h = h.norm();
    if !norm_h.is_finite() || norm_h < MIN_HORIZONTAL_NORM {
        return None;
    }

    let h = h / norm_h;
    let a = gravity / norm_sq_a.sqrt();
    let m = a.cross(&h);

    let rotation = Mat3::from_rows(&[h.transpose(), m.transpose(), a.transpose()]);

    let norm_e = geomagnetic.norm();
    let c = geomagnetic.dot(&m) / norm_e;
    let s = geomagnetic.dot(&a) / norm_e;
    #[rustfmt::skip]
    let inclination = Mat3::new(
        1.0, 0.0, 0.0,
        0.0, c,   s,
        0.0, -s,  c,
    );

    Some(RotationSolution {
        rotation,
        inclination,
    })
}

/// Extract azimuth, pitch and roll from a rotation matrix
pub fn orientation(rotation: &Mat3) -> Orientation {
    Orientation {
        azimuth: rotation[(0, 1)].atan2(rotation[(1, 1)]),
        pitch: (-rotation[(2, 1)]).clamp(-1.0, 1.0).asin(),
        roll: (-rotation[(2, 0)]).atan2(rotation[(2, 2)]),
    }
}

impl RotationSolution {
    /// Magnetic inclination (dip) angle in radians
    pub fn inclination_angle(&self) -> f64 {
        self.inclination[(1, 2)].atan2(self.inclination[(1, 1)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_flat_device_pointing_north() {
        let gravity = Vec3::new(0.0, 0.0, 9.81);
        let field = Vec3::new(0.0, 30.0, -40.0);
        let solution = rotation_matrix(&gravity, &field).unwrap();

        assert_abs_diff_eq!(solution.rotation, Mat3::identity(), epsilon = 1e-9);
        let angles = orientation(&solution.rotation);
        assert_abs_diff_eq!(angles.azimuth, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(angles.pitch, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(angles.roll, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_is_orthonormal() {
        let gravity = Vec3::new(1.2, -0.4, 9.6);
        let field = Vec3::new(12.0, 25.0, -38.0);
        let solution = rotation_matrix(&gravity, &field).unwrap();
        let product = solution.rotation * solution.rotation.transpose();
        assert_abs_diff_eq!(product, Mat3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn test_inclination_angle() {
        // 30 µT horizontal, 40 µT pointing down
        let gravity = Vec3::new(0.0, 0.0, 9.81);
        let field = Vec3::new(0.0, 30.0, -40.0);
        let solution = rotation_matrix(&gravity, &field).unwrap();
        let expected = (-40.0f64).atan2(30.0);
        assert_abs_diff_eq!(solution.inclination_angle(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_parallel_vectors_rejected() {
        let gravity = Vec3::new(0.0, 0.0, 9.81);
        let field = Vec3::new(0.0, 0.0, 50.0);
        assert!(rotation_matrix(&gravity, &field).is_none());
    }

    #[test]
    fn test_free_fall_rejected() {
        let gravity = Vec3::new(0.0, 0.0, 0.5);
        let field = Vec3::new(0.0, 30.0, -40.0);
        assert!(rotation_matrix(&gravity, &field).is_none());
    }

    #[test]
    fn test_non_finite_rejected() {
        let gravity = Vec3::new(f64::NAN, 0.0, 9.81);
        let field = Vec3::new(0.0, 30.0, -40.0);
        assert!(rotation_matrix(&gravity, &field).is_none());
    }
}
