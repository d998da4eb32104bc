pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};

/// Source of a tri-axis sample
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Acceleration,
    MagneticField,
}

/// Raw tri-axis sample as delivered by the sensor source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub kind: SensorKind,
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn new(kind: SensorKind, x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self {
            kind,
            timestamp,
            x,
            y,
            z,
        }
    }

    pub fn accel(x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self::new(SensorKind::Acceleration, x, y, z, timestamp)
    }

    pub fn magnetic(x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self::new(SensorKind::MagneticField, x, y, z, timestamp)
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn as_vector(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_magnitude() {
        let accel = Sample::accel(3.0, 4.0, 0.0, 0.0);
        assert_eq!(accel.magnitude(), 5.0);
        assert_eq!(accel.kind, SensorKind::Acceleration);
    }

    #[test]
    fn test_sample_vector() {
        let mag = Sample::magnetic(1.0, 2.0, 3.0, 0.5);
        assert_eq!(mag.as_vector(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mag.kind, SensorKind::MagneticField);
    }
}
