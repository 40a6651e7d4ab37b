//! # Host Bridge Traits
//!
//! Boundary traits between the synchronization core and the outside world.
//!
//! ## Overview
//!
//! This crate defines the contract between the core and every external collaborator
//! it talks to: the HTTP transport, the data sources being synchronized, and the
//! player directory. Concrete implementations live in `bridge-desktop` (transport)
//! and the `provider-*` crates (sources).
//!
//! ## Traits
//!
//! ### Transport
//! - [`HttpClient`](http::HttpClient) - Single-attempt async HTTP GET/HEAD/POST
//!
//! ### Sources
//! - [`SourceAdapter`](source::SourceAdapter) - Paginated listing plus per-item payload lookup
//! - [`ProfileSource`](source::ProfileSource) - Batch player profile lookup
//!
//! ### Policy
//! - [`RetryPolicy`](retry::RetryPolicy) - Bounded exponential backoff over classified failures
//!
//! ## Error Handling
//!
//! Transport implementations return [`BridgeError`](error::BridgeError). Sources
//! return [`FetchError`](error::FetchError), which splits every failure into
//! transient (retry), fatal (skip this unit) and exhausted (retries ran out).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so adapters can be shared across
//! concurrently running source jobs.

pub mod error;
pub mod http;
pub mod retry;
pub mod source;

pub use error::{BridgeError, FetchError};

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use retry::{fetch_json, RetryPolicy};
pub use source::{
    ItemEnvelope, ItemId, Page, PageParams, PayloadMode, ProfileSource, ProfileSummary,
    RawPayload, SourceAdapter, SourceCapabilities, SourceId,
};
