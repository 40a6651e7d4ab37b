//! # Local Sources
//!
//! Source adapters that read from the local machine instead of a remote API.
//!
//! ## Overview
//!
//! - [`JsonDirectorySource`]: a directory of `<id>.json` documents
//! - [`SnapshotSource`]: a read-only clone_logs SQLite database, rebuilt into
//!   logs.tf documents
//! - [`IdListSource`]: a caller-supplied id list resolved through another source
//!
//! Local sources are not paced. A missing directory or database lists no
//! items; a missing document for a listed id is a fatal error for that item.

pub mod directory;
pub mod error;
pub mod id_list;
pub mod snapshot;

pub use directory::{JsonDirectorySource, LOCAL_PAGE_SIZE};
pub use error::{LocalError, Result};
pub use id_list::IdListSource;
pub use snapshot::SnapshotSource;
