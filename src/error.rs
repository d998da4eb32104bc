use thiserror::Error;

/// Forwarder error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForwarderError {
    #[error("Forwarder not running")]
    NotRunning,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Socket error: {0}")]
    SocketError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for forwarder operations
pub type ForwarderResult<T> = Result<T, ForwarderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ForwarderError::InvalidParameters("port 0 out of range".to_string());
        assert_eq!(err.to_string(), "Invalid parameters: port 0 out of range");
        assert_eq!(
            ForwarderError::SocketError("bind failed".to_string()).to_string(),
            "Socket error: bind failed"
        );
    }

    #[test]
    fn test_result_alias_propagates() {
        fn parse_port(text: &str) -> ForwarderResult<u16> {
            text.parse()
                .map_err(|_| ForwarderError::InvalidParameters(format!("bad port {}", text)))
        }
        fn double(text: &str) -> ForwarderResult<u32> {
            Ok(u32::from(parse_port(text)?) * 2)
        }

        assert_eq!(double("4000"), Ok(8000));
        assert_eq!(
            double("x"),
            Err(ForwarderError::InvalidParameters("bad port x".to_string()))
        );
    }
}
