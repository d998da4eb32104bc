pub mod complementary;
pub mod rotation;

pub use complementary::{CompassState, HeadingEstimator, HeadingListener, PUBLISH_INTERVAL_MS};
