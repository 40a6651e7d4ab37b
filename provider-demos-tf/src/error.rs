//! Error types for the demos.tf provider

use bridge_traits::FetchError;
use thiserror::Error;

/// demos.tf provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DemosTfError {
    /// A listing entry or document is missing its identity
    #[error("Invalid demo {id}: {message}")]
    InvalidDemo { id: u64, message: String },

    /// Transport or status failure, already classified
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Result type for demos.tf operations
pub type Result<T> = std::result::Result<T, DemosTfError>;

impl From<DemosTfError> for FetchError {
    fn from(error: DemosTfError) -> Self {
        match error {
            e @ DemosTfError::InvalidDemo { .. } => FetchError::fatal(e.to_string()),
            DemosTfError::Fetch(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DemosTfError::InvalidDemo {
            id: 12,
            message: "document has no id".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid demo 12: document has no id");
    }

    #[test]
    fn test_invalid_demo_is_fatal() {
        let error: FetchError = DemosTfError::InvalidDemo {
            id: 12,
            message: "mismatched id 13".to_string(),
        }
        .into();
        assert!(!error.is_retryable());
    }
}
