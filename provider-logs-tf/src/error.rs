//! Error types for the logs.tf provider

use bridge_traits::FetchError;
use thiserror::Error;

/// logs.tf provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogsTfError {
    /// The API answered but reported `success: false`
    #[error("logs.tf API request failed: {0}")]
    Api(String),

    /// A listing entry could not be used
    #[error("Invalid log listing entry: {0}")]
    InvalidListing(String),

    /// Transport or status failure, already classified
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Result type for logs.tf operations
pub type Result<T> = std::result::Result<T, LogsTfError>;

impl From<LogsTfError> for FetchError {
    fn from(error: LogsTfError) -> Self {
        match error {
            LogsTfError::Api(message) => FetchError::fatal(format!("logs.tf API: {}", message)),
            LogsTfError::InvalidListing(message) => FetchError::fatal(message),
            LogsTfError::Fetch(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_failure_is_fatal() {
        let error: FetchError = LogsTfError::Api("Invalid log ID".to_string()).into();
        assert!(!error.is_retryable());
        assert!(error.to_string().contains("Invalid log ID"));
    }

    #[test]
    fn test_fetch_error_passes_through() {
        let inner = FetchError::from_status(503, "unavailable");
        let error: FetchError = LogsTfError::from(inner.clone()).into();
        assert_eq!(error, inner);
    }
}
