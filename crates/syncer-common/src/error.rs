//! Error types for the syncer
//!
//! One enum covers every failure category the reconciliation engine and the
//! backends can raise. Transport-level failures are classified by the side that
//! failed so the log stream tells discovery problems apart from gateway ones.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum SyncerError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("backend type '{0}' is not supported")]
    BackendUnsupported(String),

    #[error("sync failed: {0}")]
    SyncFailed(String),

    #[error("{0} not found")]
    ClientNotFound(String),

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl SyncerError {
    /// Whether this error came from talking to a remote backend
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            SyncerError::DiscoveryUnavailable(_)
                | SyncerError::GatewayUnavailable(_)
                | SyncerError::SyncFailed(_)
        )
    }

    pub fn invalid_pattern(pattern: &str, err: regex::Error) -> Self {
        SyncerError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncerError::BackendUnsupported("zookeeper".to_string());
        assert_eq!(err.to_string(), "backend type 'zookeeper' is not supported");

        let err = SyncerError::ClientNotFound("discovery 'nacos1'".to_string());
        assert_eq!(err.to_string(), "discovery 'nacos1' not found");

        let err = SyncerError::DiscoveryUnavailable("status 503".to_string());
        assert_eq!(err.to_string(), "discovery unavailable: status 503");
    }

    #[test]
    fn test_backend_failure_classification() {
        assert!(SyncerError::GatewayUnavailable("x".into()).is_backend_failure());
        assert!(SyncerError::SyncFailed("x".into()).is_backend_failure());
        assert!(!SyncerError::ConfigInvalid("x".into()).is_backend_failure());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = regex::Regex::new("(").unwrap_err();
        let err = SyncerError::invalid_pattern("(", err);
        assert!(err.to_string().starts_with("invalid pattern '('"));
    }
}
