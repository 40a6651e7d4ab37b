//! Error types for the ETF2L provider

use bridge_traits::FetchError;
use thiserror::Error;

/// ETF2L provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Etf2lError {
    /// The response lacked its pagination block
    #[error("ETF2L response for {url} has no page information")]
    MissingPage { url: String },

    /// Transport or status failure, already classified
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Result type for ETF2L operations
pub type Result<T> = std::result::Result<T, Etf2lError>;

impl From<Etf2lError> for FetchError {
    fn from(error: Etf2lError) -> Self {
        match error {
            e @ Etf2lError::MissingPage { .. } => FetchError::fatal(e.to_string()),
            Etf2lError::Fetch(e) => e,
        }
    }
}
