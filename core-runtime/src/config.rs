//! # Importer Configuration Module
//!
//! Provides configuration management for the importer.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! [`ImporterConfig`]. `build()` validates every setting and fails fast with an
//! actionable message, so a misconfigured pacing delay or page size never reaches a
//! running job.
//!
//! Settings are layered:
//! 1. Built-in defaults
//! 2. Explicit builder calls
//! 3. Environment overrides (`IMPORTER_*`), applied last by [`ImporterConfig::from_env`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ImporterConfig, SourceSettings};
//! use std::time::Duration;
//!
//! let config = ImporterConfig::builder()
//!     .database_path("/var/lib/importer/importer.db")
//!     .batch_size(100)
//!     .source(
//!         "logs.tf",
//!         SourceSettings::default().with_pacing_delay(Duration::from_millis(500)),
//!     )
//!     .build()?;
//! ```
//!
//! ## Environment
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `IMPORTER_DATABASE` | `database_path` |
//! | `IMPORTER_TIMEOUT` | `request_timeout` (seconds) |
//! | `IMPORTER_BATCH_SIZE` | `batch_size` |
//! | `IMPORTER_STEAM_KEY` | `steam_api_key` |
//! | `IMPORTER_PACING_MS` | default source `pacing_delay` |

use crate::error::{Error, Result};
use crate::logging::redact_if_sensitive;
use bridge_traits::RetryPolicy;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Largest page any source accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Upper bound for any configured pacing delay.
pub const MAX_PACING_DELAY: Duration = Duration::from_secs(60);

const ENV_DATABASE: &str = "IMPORTER_DATABASE";
const ENV_TIMEOUT: &str = "IMPORTER_TIMEOUT";
const ENV_BATCH_SIZE: &str = "IMPORTER_BATCH_SIZE";
const ENV_STEAM_KEY: &str = "IMPORTER_STEAM_KEY";
const ENV_PACING_MS: &str = "IMPORTER_PACING_MS";

// ============================================================================
// Retry Settings
// ============================================================================

/// Backoff settings shared by every network source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Attempts per request, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetrySettings {
    /// Build the transport retry policy for these settings.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_delay, self.max_delay)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Retry max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_attempts > 20 {
            return Err(Error::Config(
                "Retry max_attempts exceeds maximum of 20".to_string(),
            ));
        }
        if self.base_delay > self.max_delay {
            return Err(Error::Config(format!(
                "Retry base delay ({}ms) exceeds max delay ({}ms)",
                self.base_delay.as_millis(),
                self.max_delay.as_millis()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Per-Source Settings
// ============================================================================

/// Settings applied to one source's runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    /// Delay between successive network requests, regardless of outcome
    pub pacing_delay: Duration,
    /// Requested listing page size (capped again by the source's own maximum)
    pub page_size: u32,
    /// Stop after this many fresh items
    pub max_count: Option<u64>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            pacing_delay: Duration::from_millis(250),
            page_size: MAX_PAGE_SIZE,
            max_count: None,
        }
    }
}

impl SourceSettings {
    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_count(mut self, max_count: u64) -> Self {
        self.max_count = Some(max_count);
        self
    }

    fn validate(&self, source: &str) -> Result<()> {
        if self.pacing_delay > MAX_PACING_DELAY {
            return Err(Error::Config(format!(
                "Pacing delay for '{}' exceeds maximum of 60 seconds (60,000ms)",
                source
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size for '{}' must be between 1 and {}",
                source, MAX_PAGE_SIZE
            )));
        }
        if self.max_count == Some(0) {
            return Err(Error::Config(format!(
                "Max count for '{}' must be greater than 0 when set",
                source
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Importer Configuration
// ============================================================================

/// Complete importer configuration. Use [`ImporterConfigBuilder`] to construct.
#[derive(Clone, PartialEq, Eq)]
pub struct ImporterConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Per-request timeout; a timed-out request is retried
    pub request_timeout: Duration,

    /// Deadline for a whole source run
    pub run_timeout: Option<Duration>,

    /// Items merged per transaction
    pub batch_size: usize,

    /// User agent sent to every source
    pub user_agent: String,

    /// Steam Web API key, required only for player refresh
    pub steam_api_key: Option<String>,

    pub retry: RetrySettings,

    /// Settings for sources without their own entry
    pub default_source: SourceSettings,

    /// Settings keyed by source id
    pub sources: HashMap<String, SourceSettings>,
}

impl std::fmt::Debug for ImporterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImporterConfig")
            .field("database_path", &self.database_path)
            .field("request_timeout", &self.request_timeout)
            .field("run_timeout", &self.run_timeout)
            .field("batch_size", &self.batch_size)
            .field("user_agent", &self.user_agent)
            .field(
                "steam_api_key",
                &self
                    .steam_api_key
                    .as_deref()
                    .map(|key| redact_if_sensitive("api_key", key)),
            )
            .field("retry", &self.retry)
            .field("default_source", &self.default_source)
            .field("sources", &self.sources)
            .finish()
    }
}

impl ImporterConfig {
    /// Creates a new builder for constructing an `ImporterConfig`.
    pub fn builder() -> ImporterConfigBuilder {
        ImporterConfigBuilder::default()
    }

    /// Builds a configuration from defaults plus `IMPORTER_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed or the result fails
    /// validation.
    pub fn from_env() -> Result<Self> {
        Self::builder().env_overrides(std::env::vars())?.build()
    }

    /// Settings for a source, falling back to the default entry.
    pub fn source_settings(&self, source: &str) -> &SourceSettings {
        self.sources.get(source).unwrap_or(&self.default_source)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.batch_size == 0 {
            return Err(Error::Config(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if matches!(self.run_timeout, Some(t) if t.is_zero()) {
            return Err(Error::Config(
                "Run timeout must be greater than 0 when set".to_string(),
            ));
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("User agent cannot be empty".to_string()));
        }

        if matches!(self.steam_api_key.as_deref(), Some(key) if key.trim().is_empty()) {
            return Err(Error::Config(
                "Steam API key cannot be empty when set".to_string(),
            ));
        }

        self.retry.validate()?;
        self.default_source.validate("default")?;
        for (source, settings) in &self.sources {
            settings.validate(source)?;
        }

        Ok(())
    }
}

/// Builder for [`ImporterConfig`]
#[derive(Debug, Default)]
pub struct ImporterConfigBuilder {
    database_path: Option<PathBuf>,
    request_timeout: Option<Duration>,
    run_timeout: Option<Duration>,
    batch_size: Option<usize>,
    user_agent: Option<String>,
    steam_api_key: Option<String>,
    retry: Option<RetrySettings>,
    default_source: Option<SourceSettings>,
    sources: HashMap<String, SourceSettings>,
}

impl ImporterConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn steam_api_key(mut self, key: impl Into<String>) -> Self {
        self.steam_api_key = Some(key.into());
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn default_source(mut self, settings: SourceSettings) -> Self {
        self.default_source = Some(settings);
        self
    }

    pub fn source(mut self, source: impl Into<String>, settings: SourceSettings) -> Self {
        self.sources.insert(source.into(), settings);
        self
    }

    /// Applies `IMPORTER_*` overrides from an iterator of environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a recognised variable has an unparseable value.
    pub fn env_overrides<I>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                ENV_DATABASE => self.database_path = Some(PathBuf::from(value)),
                ENV_TIMEOUT => {
                    let secs = parse_env::<u64>(&key, &value)?;
                    self.request_timeout = Some(Duration::from_secs(secs));
                }
                ENV_BATCH_SIZE => self.batch_size = Some(parse_env(&key, &value)?),
                ENV_STEAM_KEY => self.steam_api_key = Some(value),
                ENV_PACING_MS => {
                    let millis = parse_env::<u64>(&key, &value)?;
                    let settings = self.default_source.take().unwrap_or_default();
                    self.default_source =
                        Some(settings.with_pacing_delay(Duration::from_millis(millis)));
                }
                _ => {}
            }
        }
        Ok(self)
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn build(self) -> Result<ImporterConfig> {
        let config = ImporterConfig {
            database_path: self
                .database_path
                .unwrap_or_else(|| PathBuf::from("importer.db")),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
            run_timeout: self.run_timeout,
            batch_size: self.batch_size.unwrap_or(50),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| concat!("match-importer/", env!("CARGO_PKG_VERSION")).to_string()),
            steam_api_key: self.steam_api_key,
            retry: self.retry.unwrap_or_default(),
            default_source: self.default_source.unwrap_or_default(),
            sources: self.sources,
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| Error::Config(format!("Invalid value for {}: '{}' ({})", key, value, e)))
}
