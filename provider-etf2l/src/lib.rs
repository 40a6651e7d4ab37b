//! # ETF2L Provider
//!
//! Implements `SourceAdapter` and `RecordNormalizer` for the ETF2L league API.
//!
//! ## Overview
//!
//! - League results from `/results/{page}.json`
//! - Per-team transfer history from `/team/{id}/transfers/{page}.json`
//! - Entries are embedded in the listing and stamped with the listing time
//!   (`fetched`), so no per-item request is ever made
//!
//! Transfers have no identifier of their own. Their item id is their position
//! in the feed, and the store deduplicates them by content.

pub mod connector;
pub mod error;
pub mod normalize;
pub mod types;

pub use connector::{Etf2lFeed, Etf2lSource, ETF2L_API, PER_PAGE};
pub use error::{Etf2lError, Result};
pub use normalize::{ResultNormalizer, TransferNormalizer};
