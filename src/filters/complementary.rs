use crate::filters::rotation::{orientation, rotation_matrix};
use crate::smoothing::{VectorSmoother, DEFAULT_ALPHA};
use crate::types::{Sample, SensorKind};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Minimum spacing between two published headings
pub const PUBLISH_INTERVAL_MS: u64 = 250;

/// Heading-change callback, receives degrees in [0, 360).
///
/// Runs on the producer's thread after the filter lock is released. With
/// several producing threads, two publishes may reach the listener in the
/// opposite order from the one in which they were computed.
pub type HeadingListener = Box<dyn Fn(f64) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompassState {
    /// Missing at least one sample of either kind, heading reported as 0
    Uninitialized,
    /// Both smoothed vectors defined, heading recomputed on every sample
    Active,
}

struct FilterState {
    gravity: VectorSmoother,
    geomagnetic: VectorSmoother,
    azimuth: f64,
    azimuth_fix: f64,
    last_publish_ms: Option<u64>,
}

/// Compass heading from smoothed accelerometer and magnetometer vectors.
///
/// Samples of both kinds may arrive concurrently from different threads;
/// all state lives behind one mutex. Published headings are throttled to
/// one per [`PUBLISH_INTERVAL_MS`], the listener runs after the lock is
/// released.
pub struct HeadingEstimator {
    state: Mutex<FilterState>,
    listener: Option<HeadingListener>,
    epoch: Instant,
}

impl HeadingEstimator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FilterState {
                gravity: VectorSmoother::new(DEFAULT_ALPHA),
                geomagnetic: VectorSmoother::new(DEFAULT_ALPHA),
                azimuth: 0.0,
                azimuth_fix: 0.0,
                last_publish_ms: None,
            }),
            listener: None,
            epoch: Instant::now(),
        }
    }

    pub fn with_listener<F>(listener: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        let mut estimator = Self::new();
        estimator.listener = Some(Box::new(listener));
        estimator
    }

    /// Feed one sample using the monotonic clock.
    ///
    /// Returns the heading if this sample caused a publish.
    pub fn update(&self, sample: &Sample) -> Option<f64> {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        self.update_at(sample, now_ms)
    }

    /// Feed one sample observed at `now_ms` milliseconds on a monotonic clock
    pub fn update_at(&self, sample: &Sample, now_ms: u64) -> Option<f64> {
        let published = {
            let mut state = self.lock_state();

            match sample.kind {
                SensorKind::Acceleration => {
                    state.gravity.apply(sample.as_vector());
                }
                SensorKind::MagneticField => {
                    state.geomagnetic.apply(sample.as_vector());
                }
            }

            let (gravity, geomagnetic) = match (state.gravity.value(), state.geomagnetic.value()) {
                (Some(g), Some(m)) => (g, m),
                _ => return None,
            };

            // Degenerate input keeps the previous heading
            let solution = rotation_matrix(&gravity, &geomagnetic)?;
            let yaw = orientation(&solution.rotation).azimuth.to_degrees();
            state.azimuth = (-yaw + state.azimuth_fix + 360.0).rem_euclid(360.0);

            let due = state
                .last_publish_ms
                .map_or(true, |last| now_ms.saturating_sub(last) >= PUBLISH_INTERVAL_MS);
            if !due {
                return None;
            }
            state.last_publish_ms = Some(now_ms);
            state.azimuth
        };

        if let Some(listener) = self.listener.as_ref() {
            listener(published);
        }
        Some(published)
    }

    pub fn set_azimuth_fix(&self, degrees: f64) {
        self.lock_state().azimuth_fix = degrees;
    }

    pub fn reset_azimuth_fix(&self) {
        self.set_azimuth_fix(0.0);
    }

    pub fn azimuth_fix(&self) -> f64 {
        self.lock_state().azimuth_fix
    }

    /// Most recently computed heading, published or not
    pub fn get_heading(&self) -> f64 {
        self.lock_state().azimuth
    }

    pub fn state(&self) -> CompassState {
        let state = self.lock_state();
        if state.gravity.is_initialized() && state.geomagnetic.is_initialized() {
            CompassState::Active
        } else {
            CompassState::Uninitialized
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, FilterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HeadingEstimator {
    fn default() -> Self {
        Self::new()
    }
}
