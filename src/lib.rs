//! Workspace umbrella crate.
//!
//! Re-exports the importer service when the `desktop-shims` feature is enabled,
//! so hosts can depend on `importer-workspace` without wiring each crate.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
