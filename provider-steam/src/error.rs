//! Error types for the Steam Web API provider

use bridge_traits::FetchError;
use thiserror::Error;

/// Steam provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SteamError {
    /// No Web API key was configured
    #[error("Steam Web API key is not configured")]
    MissingApiKey,

    /// Transport or status failure, already classified
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Result type for Steam operations
pub type Result<T> = std::result::Result<T, SteamError>;

impl From<SteamError> for FetchError {
    fn from(error: SteamError) -> Self {
        match error {
            SteamError::MissingApiKey => FetchError::Fatal {
                status: Some(401),
                message: SteamError::MissingApiKey.to_string(),
            },
            SteamError::Fetch(e) => e,
        }
    }
}
