//! # Importer Service
//!
//! Façade that wires configuration, the store, the sync driver and every
//! source provider into one handle for host applications.
//!
//! ## Overview
//!
//! - [`SourceSpec`] names one walk (logs.tf bulk, demos.tf list, an ETF2L feed,
//!   a local directory or snapshot) and resolves it to an adapter, a normalizer
//!   and a cursor strategy
//! - [`ImporterService`] runs specs, alone or concurrently, and exposes
//!   checkpoints, run history, player refresh and demo links
//!
//! Desktop builds enable the `desktop-shims` feature, which provides the
//! `reqwest` HTTP client used by [`ImporterService::new`]. Any other
//! [`bridge_traits::HttpClient`] can be passed to
//! [`ImporterService::with_dependencies`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::ImporterConfig;
//! use core_service::{ImporterService, SourceSpec};
//! use tokio_util::sync::CancellationToken;
//!
//! let service = ImporterService::new(ImporterConfig::from_env()?).await?;
//! let report = service
//!     .run(SourceSpec::LogsBulk { players: vec![], since: None }, CancellationToken::new())
//!     .await?;
//! ```

pub mod error;
pub mod service;
pub mod spec;

pub use error::{CoreError, Result};
pub use service::{ImporterService, STEAM_SETTINGS_KEY};
pub use spec::SourceSpec;

pub use core_sync::{PlayerWalk, RefreshReport, RunReport};
