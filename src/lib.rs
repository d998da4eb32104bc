// GPSd forwarder
// Relays NMEA sentences plus a compass heading to a UDP listener

pub mod config;
pub mod error;
pub mod filters;
pub mod live_status;
pub mod nmea;
pub mod sensors;
pub mod session;
pub mod smoothing;
pub mod types;
pub mod udp_stream;

pub use config::{Destination, RelayConfig};
pub use error::{ForwarderError, ForwarderResult};
pub use filters::{CompassState, HeadingEstimator};
pub use session::{ForwarderSession, NmeaListener, ProviderEvent, ProviderStatus, SessionState};
pub use types::{Sample, SensorKind};
pub use udp_stream::{LogSink, UdpRelay, QUEUE_CAPACITY};
