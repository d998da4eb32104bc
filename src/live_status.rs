use crate::error::ForwarderResult;
use crate::filters::CompassState;
use crate::session::{ForwarderSession, SessionState};
use crate::udp_stream::RelayStatsSnapshot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub session_id: String,
    pub state: SessionState,
    pub destination: Option<String>,
    pub uptime_seconds: u64,
    // Compass
    pub compass_state: CompassState,
    pub heading_enabled: bool,
    pub heading_deg: f64,
    pub azimuth_fix: f64,
    pub last_published_heading: Option<f64>,
    pub accel_samples: u64,
    pub magnetic_samples: u64,
    // Relay
    pub sentences_forwarded: u64,
    pub relay: RelayStatsSnapshot,
}

impl LiveStatus {
    pub fn capture(session: &ForwarderSession, uptime_seconds: u64) -> ForwarderResult<Self> {
        let meta = session.metadata()?;
        let estimator = session.estimator();
        Ok(Self {
            timestamp: current_timestamp(),
            session_id: meta.session_id,
            state: meta.state,
            destination: meta.destination.map(|d| d.to_string()),
            uptime_seconds,
            compass_state: estimator.state(),
            heading_enabled: meta.heading_enabled,
            heading_deg: estimator.get_heading(),
            azimuth_fix: estimator.azimuth_fix(),
            last_published_heading: meta.last_published_heading,
            accel_samples: meta.accel_sample_count,
            magnetic_samples: meta.magnetic_sample_count,
            sentences_forwarded: meta.sentences_forwarded,
            relay: session.relay_stats().unwrap_or_default(),
        })
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
