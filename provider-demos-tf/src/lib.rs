//! # demos.tf Provider
//!
//! Implements `SourceAdapter` and `RecordNormalizer` for demos.tf.
//!
//! ## Overview
//!
//! - Page-numbered listing of `/demos` (50 per page, newest first, no total)
//!   with `after`/`before` time filters applied by the API
//! - Per-demo retrieval of `/demos/{id}`, including the player list
//! - Normalization into demo records
//!
//! Because the listing reports no total, a page that yields no new
//! identifiers ends the walk.

pub mod connector;
pub mod error;
pub mod normalize;
pub mod types;

pub use connector::{page_for_offset, DemosTfSource, DEMOS_TF_API, PAGE_SIZE, SOURCE_ID};
pub use error::{DemosTfError, Result};
pub use normalize::DemosTfNormalizer;
pub use types::{DemoDocument, DemoSummary};
