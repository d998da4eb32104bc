use crate::types::Vec3;

/// Smoothing factor applied to the previous estimate
pub const DEFAULT_ALPHA: f64 = 0.99;

/// Exponential low-pass filter over tri-axis sensor vectors
///
/// The device's X and Y sensor axes are swapped before smoothing to
/// correct for the hardware mounting orientation.
#[derive(Clone, Debug)]
pub struct VectorSmoother {
    alpha: f64,
    value: Option<Vec3>,
}

impl VectorSmoother {
    /// Create a new smoother with the given weight on the previous estimate
    pub fn new(alpha: f64) -> Self {
        VectorSmoother { alpha, value: None }
    }

    /// Feed one raw reading and return the smoothed vector
    ///
    /// The first reading seeds the estimate directly; afterwards
    /// `new = alpha * old + (1 - alpha) * raw`.
    pub fn apply(&mut self, raw: Vec3) -> Vec3 {
        let swapped = Vec3::new(raw.y, raw.x, raw.z);
        let next = match self.value {
            Some(old) => old * self.alpha + swapped * (1.0 - self.alpha),
            None => swapped,
        };
        self.value = Some(next);
        next
    }

    /// Current estimate, `None` until the first reading
    pub fn value(&self) -> Option<Vec3> {
        self.value
    }

    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }
}

impl Default for VectorSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}
