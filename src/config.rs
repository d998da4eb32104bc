use crate::error::{ForwarderError, ForwarderResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::Path;

/// Resolved UDP endpoint of the listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    addr: SocketAddr,
}

impl Destination {
    /// Build from an IP literal; host names are not resolved here
    pub fn new(host: &str, port: i64) -> ForwarderResult<Self> {
        let port = validate_port(port)?;
        let ip: IpAddr = host.trim().parse().map_err(|_| {
            ForwarderError::InvalidParameters(format!("{} is not a resolved IP address", host))
        })?;
        Ok(Self {
            addr: SocketAddr::new(ip, port),
        })
    }

    pub fn from_socket_addr(addr: SocketAddr) -> ForwarderResult<Self> {
        validate_port(i64::from(addr.port()))?;
        Ok(Self { addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Check a port number from user input (1-65535)
pub fn validate_port(port: i64) -> ForwarderResult<u16> {
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(ForwarderError::InvalidParameters(format!(
            "port {} out of range 1-65535",
            port
        ))),
    }
}

fn default_heading() -> bool {
    true
}

/// Forwarding options supplied by the launcher (CLI or config file)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub host: String,
    pub port: i64,
    /// Fixed offset added to every heading, degrees
    #[serde(default)]
    pub azimuth_fix: f64,
    /// Append a `$HDM` line to every forwarded sentence
    #[serde(default = "default_heading")]
    pub heading: bool,
}

impl RelayConfig {
    pub fn new(host: &str, port: i64) -> Self {
        Self {
            host: host.to_string(),
            port,
            azimuth_fix: 0.0,
            heading: true,
        }
    }

    pub fn from_json(json: &str) -> ForwarderResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ForwarderError::ConfigError(format!("Invalid config: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ForwarderResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ForwarderError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> ForwarderResult<()> {
        if self.host.trim().is_empty() {
            return Err(ForwarderError::InvalidParameters(
                "server address is required".to_string(),
            ));
        }
        validate_port(self.port)?;
        if !self.azimuth_fix.is_finite() {
            return Err(ForwarderError::InvalidParameters(format!(
                "azimuth fix {} is not a number",
                self.azimuth_fix
            )));
        }
        Ok(())
    }

    /// Destination from an already resolved host
    pub fn destination(&self) -> ForwarderResult<Destination> {
        self.validate()?;
        Destination::new(&self.host, self.port)
    }

    /// Resolve `host` (name or literal) to the first address returned
    pub fn resolve(&self) -> ForwarderResult<Destination> {
        self.validate()?;
        let port = validate_port(self.port)?;
        let mut addrs = (self.host.trim(), port).to_socket_addrs().map_err(|e| {
            ForwarderError::InvalidParameters(format!("Cannot resolve {}: {}", self.host, e))
        })?;
        let addr = addrs.next().ok_or_else(|| {
            ForwarderError::InvalidParameters(format!("No address found for {}", self.host))
        })?;
        Destination::from_socket_addr(addr)
    }

    /// Copy of this config with `host` replaced by its resolved IP
    pub fn resolved(&self) -> ForwarderResult<Self> {
        let destination = self.resolve()?;
        Ok(Self {
            host: destination.addr().ip().to_string(),
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_validation() {
        assert_eq!(validate_port(1).unwrap(), 1);
        assert_eq!(validate_port(2947).unwrap(), 2947);
        assert_eq!(validate_port(65535).unwrap(), 65535);
        for bad in [0, -1, 65536, i64::MAX] {
            assert!(matches!(
                validate_port(bad),
                Err(ForwarderError::InvalidParameters(_))
            ));
        }
    }

    #[test]
    fn test_destination_requires_ip_literal() {
        let dest = Destination::new("192.168.1.10", 2947).unwrap();
        assert_eq!(dest.addr(), "192.168.1.10:2947".parse::<SocketAddr>().unwrap());
        assert_eq!(dest.to_string(), "192.168.1.10:2947");

        let v6 = Destination::new("::1", 2947).unwrap();
        assert!(v6.addr().is_ipv6());

        assert!(Destination::new("gpsd.example", 2947).is_err());
        assert!(Destination::new("192.168.1.10", 0).is_err());
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config = RelayConfig::from_json(r#"{"host": "10.0.0.2", "port": 2947}"#).unwrap();
        assert_eq!(config.azimuth_fix, 0.0);
        assert!(config.heading);
        assert_eq!(config.destination().unwrap().addr().port(), 2947);
    }

    #[test]
    fn test_config_full_json() {
        let config = RelayConfig::from_json(
            r#"{"host": "10.0.0.2", "port": 5000, "azimuth_fix": -12.5, "heading": false}"#,
        )
        .unwrap();
        assert_eq!(config.azimuth_fix, -12.5);
        assert!(!config.heading);
    }

    #[test]
    fn test_config_rejects_bad_json() {
        assert!(matches!(
            RelayConfig::from_json("{\"port\": 5000}"),
            Err(ForwarderError::ConfigError(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(RelayConfig::new("", 2947).validate().is_err());
        assert!(RelayConfig::new("10.0.0.2", -1).validate().is_err());
        let mut config = RelayConfig::new("10.0.0.2", 2947);
        config.azimuth_fix = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_literal() {
        let config = RelayConfig::new("127.0.0.1", 2947);
        let resolved = config.resolved().unwrap();
        assert_eq!(resolved.host, "127.0.0.1");
        assert_eq!(config.resolve().unwrap().addr(), "127.0.0.1:2947".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_from_missing_file() {
        assert!(matches!(
            RelayConfig::from_file("/nonexistent/gpsd_forwarder.json"),
            Err(ForwarderError::ConfigError(_))
        ));
    }
}
