//! Payload normalization seam.

use bridge_traits::RawPayload;
use thiserror::Error;

use crate::models::Record;

/// A payload that could not be turned into records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// A required field was absent or had the wrong type.
    pub fn missing(field: &str) -> Self {
        Self::new(format!("missing or invalid field '{}'", field))
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Turns one source payload into normalized records.
///
/// Implementations are pure: no I/O, no clock. A malformed payload is a
/// [`ParseError`] for that item only.
pub trait RecordNormalizer: Send + Sync {
    fn normalize(&self, payload: &RawPayload) -> Result<Vec<Record>, ParseError>;
}
