//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the importer:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities every other crate depends on. It
//! establishes the configuration surface (builder, validation, environment
//! overrides), logging conventions, and the broadcast channel used to report run
//! progress.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{ImporterConfig, ImporterConfigBuilder, RetrySettings, SourceSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, StoreEvent, SyncEvent};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
