use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use gpsd_forwarder::live_status::LiveStatus;
use gpsd_forwarder::sensors::{self, NmeaSource, SensorSource};
use gpsd_forwarder::{ForwarderSession, LogSink, NmeaListener, RelayConfig, SensorKind};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, sleep, Duration};

#[derive(Parser, Debug)]
#[command(name = "gpsd_forwarder")]
#[command(about = "Forward NMEA sentences and compass heading to a gpsd UDP listener", long_about = None)]
struct Args {
    /// Duration in seconds (0 = until Ctrl-C or end of input)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// gpsd server address (name or IP)
    #[arg(long)]
    host: Option<String>,

    /// gpsd UDP port
    #[arg(long, allow_negative_numbers = true)]
    port: Option<i64>,

    /// Fixed offset added to the compass heading, degrees
    #[arg(long, allow_negative_numbers = true)]
    azimuth_fix: Option<f64>,

    /// JSON config file; command-line flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Forward raw sentences only, without the $HDM line
    #[arg(long)]
    no_heading: bool,

    /// Where NMEA sentences come from
    #[arg(long, value_enum, default_value = "stdin")]
    source: NmeaSource,

    /// Where accelerometer/magnetometer samples come from
    #[arg(long, value_enum, default_value = "mock")]
    sensors: SensorSource,

    /// Write a JSON status snapshot here every 2 seconds
    #[arg(long, value_name = "FILE")]
    status_file: Option<String>,
}

fn build_config(args: &Args) -> Result<RelayConfig> {
    let mut config = match (&args.config, &args.host) {
        (Some(path), _) => RelayConfig::from_file(path)?,
        (None, Some(host)) => RelayConfig::new(host, args.port.unwrap_or(-1)),
        (None, None) => bail!("either --host or --config is required"),
    };
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(fix) = args.azimuth_fix {
        config.azimuth_fix = fix;
    }
    if args.no_heading {
        config.heading = false;
    }
    config.validate()?;
    Ok(config)
}

async fn run_for(duration: u64) {
    if duration == 0 {
        std::future::pending::<()>().await
    } else {
        sleep(Duration::from_secs(duration)).await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = build_config(&args)?
        .resolved()
        .with_context(|| format!("cannot use server address {:?}", args.host))?;

    println!("[{}] GPSd forwarder starting", ts_now());
    println!("  Server: {}:{}", config.host, config.port);
    println!("  Heading: {}", if config.heading { "on" } else { "off" });
    println!("  Azimuth fix: {:.1}", config.azimuth_fix);
    println!("  NMEA source: {:?}", args.source);
    println!("  Sensors: {:?}", args.sensors);

    let sink: LogSink = Arc::new(|message: &str| println!("[{}] {}", ts_now(), message));
    let session = Arc::new(ForwarderSession::with_log_sink(Some(sink)));
    session.start(&config)?;

    let accel_handle = tokio::spawn(sensors::sensor_loop(
        session.clone(),
        SensorKind::Acceleration,
        args.sensors,
    ));
    let mag_handle = tokio::spawn(sensors::sensor_loop(
        session.clone(),
        SensorKind::MagneticField,
        args.sensors,
    ));

    let listener: Arc<dyn NmeaListener> = session.clone();
    let mut nmea_handle = match args.source {
        NmeaSource::Stdin => tokio::spawn(sensors::stdin_nmea_loop(listener)),
        NmeaSource::Mock => tokio::spawn(sensors::mock_nmea_loop(listener)),
    };

    let start = Instant::now();
    let status_path = args.status_file.clone();
    let status_session = session.clone();
    let status_handle = tokio::spawn(async move {
        let Some(path) = status_path else {
            return;
        };
        let mut ticker = interval(Duration::from_secs(2));
        loop {
            ticker.tick().await;
            match LiveStatus::capture(&status_session, start.elapsed().as_secs()) {
                Ok(status) => {
                    if let Err(e) = status.save(&path) {
                        warn!("Failed to write status to {}: {}", path, e);
                    }
                }
                Err(e) => warn!("Failed to capture status: {}", e),
            }
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping..."),
        _ = run_for(args.duration) => info!("Duration reached, stopping..."),
        result = &mut nmea_handle => match result {
            Ok(count) => info!("NMEA source finished after {} sentences", count),
            Err(e) => warn!("NMEA source failed: {}", e),
        },
    }

    nmea_handle.abort();
    accel_handle.abort();
    mag_handle.abort();
    status_handle.abort();

    let stats = session.relay_stats().unwrap_or_default();
    session.stop()?;

    let final_status = LiveStatus::capture(&session, start.elapsed().as_secs())?;
    if let Some(path) = &args.status_file {
        final_status.save(path)?;
    }

    println!("\n=== Final Stats ===");
    println!("Sentences forwarded: {}", final_status.sentences_forwarded);
    println!("Datagrams sent: {}", stats.sent);
    println!("Dropped (queue full): {}", stats.dropped);
    println!("Send failures: {}", stats.failed);
    println!("Last heading: {:.1}", final_status.heading_deg);

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
