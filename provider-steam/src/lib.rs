//! # Steam Provider
//!
//! Implements `ProfileSource` over the Steam Web API so stored players can be
//! refreshed with their current display name and avatar.
//!
//! The API key travels as a query parameter and is masked in every logged URL.

pub mod connector;
pub mod error;

pub use connector::{SteamProfiles, MAX_BATCH, STEAM_API};
pub use error::{Result, SteamError};
