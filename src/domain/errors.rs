use thiserror::Error;

/// Errors raised by the broker connector transport. The rendered text of
/// `Broker` is part of the engine's contract: it is stored verbatim in
/// per-account results and decision rows.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("MT5 Connector returned status {status}: {message}")]
    Broker { status: u16, message: String },

    #[error("MT5 Connector request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("MT5 Connector transport error: {0}")]
    Transport(String),

    #[error("MT5 Connector returned an unreadable response: {0}")]
    InvalidResponse(String),
}

impl ConnectorError {
    /// HTTP status attached to this error, if the broker answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ConnectorError::Broker { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors related to configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid accounts config at {path}: {reason}")]
    InvalidAccounts { path: String, reason: String },

    #[error("Invalid environment value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_rendering() {
        let err = ConnectorError::Broker {
            status: 400,
            message: "Invalid volume".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "MT5 Connector returned status 400: Invalid volume"
        );
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_timeout_rendering() {
        let err = ConnectorError::Timeout { timeout_secs: 10 };
        assert!(err.to_string().contains("timed out after 10s"));
        assert_eq!(err.status(), None);
    }
}
