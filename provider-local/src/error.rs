//! Error types for local sources

use bridge_traits::FetchError;
use std::path::PathBuf;
use thiserror::Error;

/// Local source errors
#[derive(Error, Debug)]
pub enum LocalError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {message}")]
    Json { path: PathBuf, message: String },

    #[error("Snapshot query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Item {id} not found in {location}")]
    NotFound { id: u64, location: String },
}

/// Result type for local source operations
pub type Result<T> = std::result::Result<T, LocalError>;

impl LocalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LocalError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Local failures never go away on retry.
impl From<LocalError> for FetchError {
    fn from(error: LocalError) -> Self {
        FetchError::fatal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_errors_are_fatal() {
        let error: FetchError = LocalError::NotFound {
            id: 3,
            location: "/tmp/logs".to_string(),
        }
        .into();
        assert!(!error.is_retryable());
        assert_eq!(
            error.to_string(),
            "fatal fetch failure (status None): Item 3 not found in /tmp/logs"
        );
    }
}
