use crate::config::{Destination, RelayConfig};
use crate::error::{ForwarderError, ForwarderResult};
use crate::filters::HeadingEstimator;
use crate::nmea::compose_record;
use crate::types::{Sample, SensorKind};
use crate::udp_stream::{LogSink, RelayStatsSnapshot, UdpRelay};
use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No relay open, positioning sentences are ignored
    Idle,
    /// Forwarding sentences to the destination
    Streaming,
}

/// Location provider availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderStatus {
    OutOfService,
    TemporarilyUnavailable,
    Available,
    Unknown,
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderStatus::OutOfService => "Out of service",
            ProviderStatus::TemporarilyUnavailable => "Temporarily unavailable",
            ProviderStatus::Available => "Available",
            ProviderStatus::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Status notifications from the positioning source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderEvent {
    Enabled(String),
    Disabled(String),
    StatusChanged {
        provider: String,
        status: ProviderStatus,
        satellites: Option<u32>,
    },
}

impl fmt::Display for ProviderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderEvent::Enabled(provider) => {
                write!(f, "Location provider enabled: {}", provider)
            }
            ProviderEvent::Disabled(provider) => {
                write!(f, "Location provider disabled: {}", provider)
            }
            ProviderEvent::StatusChanged {
                provider,
                status,
                satellites: Some(count),
            } => write!(f, "{} status: {} with {} satellites", provider, status, count),
            ProviderEvent::StatusChanged {
                provider, status, ..
            } => write!(f, "{} status: {}", provider, status),
        }
    }
}

/// Receiver of positioning sentences.
///
/// Whatever produces NMEA text (a platform location API, a serial port,
/// stdin) adapts to this one interface.
pub trait NmeaListener: Send + Sync {
    fn on_nmea_message(&self, sentence: &str);

    fn on_provider_event(&self, _event: &ProviderEvent) {}
}

/// Session metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub start_time: String,
    pub state: SessionState,
    pub destination: Option<Destination>,
    pub heading_enabled: bool,
    pub sentences_forwarded: u64,
    pub accel_sample_count: u64,
    pub magnetic_sample_count: u64,
    pub last_published_heading: Option<f64>,
}

struct ActiveStream {
    relay: UdpRelay,
    heading: bool,
}

/// Forwarding session: positioning sentences in, UDP datagrams out.
///
/// The compass keeps running while idle so a heading is ready as soon as
/// streaming starts.
pub struct ForwarderSession {
    metadata: Arc<Mutex<SessionMetadata>>,
    estimator: Arc<HeadingEstimator>,
    stream: Mutex<Option<ActiveStream>>,
    sink: Option<LogSink>,
}

impl ForwarderSession {
    /// Create new session in Idle state
    pub fn new() -> Self {
        Self::with_log_sink(None)
    }

    pub fn with_log_sink(sink: Option<LogSink>) -> Self {
        let metadata = SessionMetadata {
            session_id: format!("session_{}", Utc::now().timestamp_millis()),
            start_time: Utc::now().to_rfc3339(),
            state: SessionState::Idle,
            destination: None,
            heading_enabled: false,
            sentences_forwarded: 0,
            accel_sample_count: 0,
            magnetic_sample_count: 0,
            last_published_heading: None,
        };
        let metadata = Arc::new(Mutex::new(metadata));

        let published = metadata.clone();
        let estimator = HeadingEstimator::with_listener(move |heading| {
            debug!("Heading {:.1}", heading);
            if let Ok(mut meta) = published.lock() {
                meta.last_published_heading = Some(heading);
            }
        });

        ForwarderSession {
            metadata,
            estimator: Arc::new(estimator),
            stream: Mutex::new(None),
            sink,
        }
    }

    /// Open a relay for `config` (Idle → Streaming).
    ///
    /// A running stream is stopped and replaced, since a relay's
    /// destination cannot change.
    pub fn start(&self, config: &RelayConfig) -> ForwarderResult<Destination> {
        let destination = config.destination()?;

        let mut stream = self.lock_stream()?;
        if let Some(previous) = stream.take() {
            previous.relay.stop();
        }

        let relay = match UdpRelay::open_with_sink(destination, self.sink.clone()) {
            Ok(relay) => relay,
            Err(e) => {
                self.log(&e.to_string());
                self.lock_metadata()?.state = SessionState::Idle;
                return Err(e);
            }
        };
        self.estimator.set_azimuth_fix(config.azimuth_fix);
        *stream = Some(ActiveStream {
            relay,
            heading: config.heading,
        });
        drop(stream);

        {
            let mut meta = self.lock_metadata()?;
            meta.state = SessionState::Streaming;
            meta.destination = Some(destination);
            meta.heading_enabled = config.heading;
        }
        self.log(&format!("Streaming to {}", destination));
        Ok(destination)
    }

    /// Stop the relay (Streaming → Idle)
    pub fn stop(&self) -> ForwarderResult<()> {
        let active = self.lock_stream()?.take();
        let Some(active) = active else {
            return Err(ForwarderError::NotRunning);
        };
        active.relay.stop();

        let mut meta = self.lock_metadata()?;
        meta.state = SessionState::Idle;
        info!("Session {} stopped", meta.session_id);
        Ok(())
    }

    /// Feed one accelerometer or magnetometer sample to the compass
    pub fn on_sample(&self, sample: &Sample) {
        self.estimator.update(sample);
        if let Ok(mut meta) = self.metadata.lock() {
            match sample.kind {
                SensorKind::Acceleration => meta.accel_sample_count += 1,
                SensorKind::MagneticField => meta.magnetic_sample_count += 1,
            }
        }
    }

    /// Forward one raw sentence; false if idle or the record was dropped
    pub fn forward(&self, sentence: &str) -> bool {
        let stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(active) = stream.as_ref() else {
            return false;
        };
        let heading = active.heading.then(|| self.estimator.get_heading());
        let queued = active.relay.send(compose_record(sentence, heading));
        drop(stream);

        if queued {
            if let Ok(mut meta) = self.metadata.lock() {
                meta.sentences_forwarded += 1;
            }
        }
        queued
    }

    /// Queue arbitrary text on the running relay
    pub fn send_text(&self, text: &str) -> bool {
        let stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        stream
            .as_ref()
            .map_or(false, |active| active.relay.send(text))
    }

    pub fn state(&self) -> ForwarderResult<SessionState> {
        Ok(self.lock_metadata()?.state)
    }

    pub fn is_streaming(&self) -> ForwarderResult<bool> {
        Ok(self.state()? == SessionState::Streaming)
    }

    /// Get metadata snapshot
    pub fn metadata(&self) -> ForwarderResult<SessionMetadata> {
        Ok(self.lock_metadata()?.clone())
    }

    pub fn relay_stats(&self) -> Option<RelayStatsSnapshot> {
        let stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        stream.as_ref().map(|active| active.relay.stats())
    }

    pub fn heading(&self) -> f64 {
        self.estimator.get_heading()
    }

    pub fn estimator(&self) -> Arc<HeadingEstimator> {
        Arc::clone(&self.estimator)
    }

    fn log(&self, message: &str) {
        info!("{}", message);
        if let Some(sink) = self.sink.as_ref() {
            sink(message);
        }
    }

    fn lock_metadata(&self) -> ForwarderResult<std::sync::MutexGuard<'_, SessionMetadata>> {
        self.metadata.lock().map_err(|_| {
            ForwarderError::Internal("Failed to acquire metadata lock".to_string())
        })
    }

    fn lock_stream(&self) -> ForwarderResult<std::sync::MutexGuard<'_, Option<ActiveStream>>> {
        self.stream.lock().map_err(|_| {
            ForwarderError::Internal("Failed to acquire stream lock".to_string())
        })
    }
}

impl NmeaListener for ForwarderSession {
    fn on_nmea_message(&self, sentence: &str) {
        self.forward(sentence);
    }

    fn on_provider_event(&self, event: &ProviderEvent) {
        self.log(&event.to_string());
    }
}

impl Default for ForwarderSession {
    fn default() -> Self {
        Self::new()
    }
}
