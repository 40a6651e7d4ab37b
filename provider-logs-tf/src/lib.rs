//! # logs.tf Provider
//!
//! Implements `SourceAdapter` and `RecordNormalizer` for logs.tf.
//!
//! ## Overview
//!
//! This module provides:
//! - Paginated listing of `/api/v1/log`, newest first, with optional player filter
//! - Per-log retrieval of the v3 JSON document
//! - Normalization of v3 documents into log records with per-player stats
//!
//! The listing reports a total and accepts up to 1000 entries per page. Items
//! are filtered by upload time on the client; the API has no `since` parameter.
//! A response with `success: false` is a fatal failure for that request.

pub mod connector;
pub mod error;
pub mod normalize;
pub mod types;

pub use connector::{LogsTfSource, LOGS_TF_API, MAX_PAGE_SIZE, SOURCE_ID};
pub use error::{LogsTfError, Result};
pub use normalize::LogsTfNormalizer;
pub use types::{LogDocument, LogListResponse, LogSummary};
