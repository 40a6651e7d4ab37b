//! # Desktop Bridge Implementations
//!
//! Native implementations of bridge traits.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls, connection pooling and per-request
//!   timeouts. Each call is a single attempt; retry and backoff are applied by
//!   [`bridge_traits::RetryPolicy`] in the calling adapter.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::time::Duration;
//!
//! let http = ReqwestHttpClient::builder()
//!     .timeout(Duration::from_secs(30))
//!     .user_agent("importer/0.1")
//!     .build()?;
//! ```

mod http;

pub use http::{ReqwestHttpClient, ReqwestHttpClientBuilder};
