//! Sample and sentence sources for the command-line forwarder.

use crate::nmea::sentence_with_checksum;
use crate::session::{ForwarderSession, NmeaListener, ProviderEvent};
use crate::types::{Sample, SensorKind};
use chrono::Utc;
use clap::ValueEnum;
use log::{debug, info, warn};
use std::io::BufRead;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SensorSource {
    /// Synthetic samples
    Mock,
    /// `termux-sensor`, falling back to synthetic samples
    Termux,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum NmeaSource {
    /// One sentence per line on standard input
    Stdin,
    /// Generated `$GPGGA` fixes, one per second
    Mock,
}

/// Feed ~50 Hz samples of one kind into the session
pub async fn sensor_loop(session: Arc<ForwarderSession>, kind: SensorKind, source: SensorSource) {
    let mut interval = interval(Duration::from_millis(20));
    let mut sample_count = 0u64;
    let mut termux_available = source == SensorSource::Termux;

    loop {
        interval.tick().await;

        let reading = if termux_available {
            let reading = read_termux_sensor(kind).await;
            if reading.is_none() {
                warn!("termux-sensor unavailable for {:?}, using synthetic samples", kind);
                termux_available = false;
            }
            reading
        } else {
            None
        };
        let sample = reading.unwrap_or_else(|| mock_sample(kind));

        session.on_sample(&sample);
        sample_count += 1;
        if sample_count % 500 == 0 {
            debug!("[{:?}] {} samples", kind, sample_count);
        }
    }
}

/// Forward stdin lines until EOF; returns the number of sentences read.
///
/// Stdin is read on its own thread so the task can be aborted without
/// waiting for the next line.
pub async fn stdin_nmea_loop(listener: Arc<dyn NmeaListener>) -> u64 {
    let (tx, rx) = mpsc::channel(64);
    let reader = thread::Builder::new()
        .name("nmea-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        });
    if let Err(e) = reader {
        warn!("Failed to start stdin reader: {}", e);
        return 0;
    }

    let count = forward_lines(rx, listener).await;
    info!("NMEA input closed after {} sentences", count);
    count
}

/// Pass each non-blank line to the listener until the channel closes
pub async fn forward_lines(
    mut lines: mpsc::Receiver<String>,
    listener: Arc<dyn NmeaListener>,
) -> u64 {
    let mut count = 0u64;
    while let Some(line) = lines.recv().await {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        listener.on_nmea_message(line);
        count += 1;
    }
    count
}

/// Emit one synthetic GGA sentence per second
pub async fn mock_nmea_loop(listener: Arc<dyn NmeaListener>) -> u64 {
    let mut interval = interval(Duration::from_secs(1));
    let mut count = 0u64;

    listener.on_provider_event(&ProviderEvent::Enabled("mock".to_string()));
    loop {
        interval.tick().await;
        listener.on_nmea_message(&mock_gga_sentence());
        count += 1;
        if count % 60 == 0 {
            debug!("[mock] {} sentences", count);
        }
    }
}

async fn read_termux_sensor(kind: SensorKind) -> Option<Sample> {
    let name = match kind {
        SensorKind::Acceleration => "accelerometer",
        SensorKind::MagneticField => "magnetic_field",
    };
    // Format: <Name> event: x=X, y=Y, z=Z, accuracy=0, timestamp=TS
    let output = Command::new("termux-sensor")
        .arg("-n")
        .arg("1")
        .arg("-s")
        .arg(name)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_sensor_output(kind, &String::from_utf8_lossy(&output.stdout))
}

/// Parse `x=..., y=..., z=...` from one line of sensor output
pub fn parse_sensor_output(kind: SensorKind, output: &str) -> Option<Sample> {
    let mut x = None;
    let mut y = None;
    let mut z = None;

    for part in output.split(|c: char| c == ',' || c == ':') {
        let part = part.trim();
        if let Some(val_str) = part.strip_prefix("x=") {
            x = Some(val_str.trim().parse().ok()?);
        } else if let Some(val_str) = part.strip_prefix("y=") {
            y = Some(val_str.trim().parse().ok()?);
        } else if let Some(val_str) = part.strip_prefix("z=") {
            z = Some(val_str.trim().parse().ok()?);
        }
    }

    Some(Sample::new(kind, x?, y?, z?, current_timestamp()))
}

fn mock_sample(kind: SensorKind) -> Sample {
    use std::f64::consts::PI;
    static ACCEL_COUNTER: AtomicU64 = AtomicU64::new(0);
    static MAG_COUNTER: AtomicU64 = AtomicU64::new(0);

    match kind {
        SensorKind::Acceleration => {
            let t = ACCEL_COUNTER.fetch_add(1, Ordering::Relaxed) as f64 * 0.02;
            Sample::accel(
                (t * 2.0 * PI).sin() * 0.05,
                (t * 2.0 * PI).cos() * 0.03,
                9.81 + (t * PI).sin() * 0.01,
                current_timestamp(),
            )
        }
        SensorKind::MagneticField => {
            // Slow full turn every ~60 s
            let t = MAG_COUNTER.fetch_add(1, Ordering::Relaxed) as f64 * 0.02;
            let angle = t * 2.0 * PI / 60.0;
            Sample::magnetic(
                30.0 * angle.cos(),
                30.0 * angle.sin(),
                -40.0,
                current_timestamp(),
            )
        }
    }
}

/// Degrees to NMEA `(d)ddmm.mmmm` plus hemisphere letter
pub fn to_nmea_coordinate(value: f64, is_latitude: bool) -> (String, char) {
    let hemisphere = match (is_latitude, value >= 0.0) {
        (true, true) => 'N',
        (true, false) => 'S',
        (false, true) => 'E',
        (false, false) => 'W',
    };
    let abs = value.abs();
    let degrees = abs.trunc();
    let minutes = (abs - degrees) * 60.0;
    let text = if is_latitude {
        format!("{:02}{:07.4}", degrees as u32, minutes)
    } else {
        format!("{:03}{:07.4}", degrees as u32, minutes)
    };
    (text, hemisphere)
}

fn mock_gga_sentence() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed) as f64;

    let (lat, ns) = to_nmea_coordinate(37.7749 + seq * 0.00001, true);
    let (lon, ew) = to_nmea_coordinate(-122.4194 + seq * 0.00001, false);
    let time = Utc::now().format("%H%M%S%.3f").to_string();
    let time = &time[..time.len() - 1];

    sentence_with_checksum(&format!(
        "GPGGA,{},{},{},{},{},1,08,0.9,{:.1},M,-25.0,M,,",
        time,
        lat,
        ns,
        lon,
        ew,
        12.0 + (seq * 0.1).sin()
    ))
}

fn current_timestamp() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::verify_checksum;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sentences: Mutex<Vec<String>>,
    }

    impl NmeaListener for Recorder {
        fn on_nmea_message(&self, sentence: &str) {
            self.sentences.lock().unwrap().push(sentence.to_string());
        }
    }

    #[tokio::test]
    async fn test_forward_lines_keeps_leading_text() {
        let (tx, rx) = mpsc::channel(8);
        for line in ["$GPGGA,1*00\r", "   ", "  $GPRMC,2*00", ""] {
            tx.send(line.to_string()).await.unwrap();
        }
        drop(tx);

        let recorder = Arc::new(Recorder::default());
        let count = forward_lines(rx, recorder.clone()).await;

        assert_eq!(count, 2);
        assert_eq!(
            *recorder.sentences.lock().unwrap(),
            vec!["$GPGGA,1*00".to_string(), "  $GPRMC,2*00".to_string()]
        );
    }

    #[tokio::test]
    async fn test_forward_lines_can_be_aborted() {
        let (tx, rx) = mpsc::channel::<String>(8);
        let recorder = Arc::new(Recorder::default());
        let handle = tokio::spawn(forward_lines(rx, recorder));

        handle.abort();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.unwrap().unwrap_err().is_cancelled());
        drop(tx);
    }

    #[test]
    fn test_parse_sensor_output() {
        let sample = parse_sensor_output(
            SensorKind::MagneticField,
            "Magnetic field event: x=12.5, y=-3.0, z=-40.25, accuracy=3, timestamp=1",
        )
        .unwrap();
        assert_eq!(sample.kind, SensorKind::MagneticField);
        assert_eq!((sample.x, sample.y, sample.z), (12.5, -3.0, -40.25));
    }

    #[test]
    fn test_parse_sensor_output_incomplete() {
        assert!(parse_sensor_output(SensorKind::Acceleration, "x=1.0, y=2.0").is_none());
        assert!(parse_sensor_output(SensorKind::Acceleration, "x=abc, y=2.0, z=1").is_none());
        assert!(parse_sensor_output(SensorKind::Acceleration, "").is_none());
    }

    #[test]
    fn test_nmea_coordinates() {
        assert_eq!(to_nmea_coordinate(37.7749, true), ("3746.4940".to_string(), 'N'));
        assert_eq!(to_nmea_coordinate(-122.4194, false), ("12225.1640".to_string(), 'W'));
        assert_eq!(to_nmea_coordinate(-5.5, true), ("0530.0000".to_string(), 'S'));
        assert_eq!(to_nmea_coordinate(8.0, false), ("00800.0000".to_string(), 'E'));
    }

    #[test]
    fn test_mock_gga_is_valid() {
        let sentence = mock_gga_sentence();
        assert!(sentence.starts_with("$GPGGA,"));
        assert!(verify_checksum(&sentence));
        let fields: Vec<&str> = sentence.split(',').collect();
        assert_eq!(fields[1].len(), 9); // hhmmss.ss
    }

    #[test]
    fn test_mock_samples_are_not_degenerate() {
        let accel = mock_sample(SensorKind::Acceleration);
        let mag = mock_sample(SensorKind::MagneticField);
        assert!((accel.magnitude() - 9.81).abs() < 0.5);
        assert!((mag.magnitude() - 50.0).abs() < 1e-9);
    }
}
