//! Importer service façade.

use std::sync::Arc;

use bridge_traits::{HttpClient, SourceId};
use core_runtime::events::EventStream;
use core_runtime::{CoreEvent, EventBus, ImporterConfig, SourceSettings, StoreEvent};
use core_store::{MergePipeline, SqlitePlayerDirectory};
use core_sync::{
    Checkpoint, DriverConfig, PlayerRefresh, PlayerWalk, RefreshReport, RunReport, SyncDriver,
    SyncRequest, SyncRun,
};
use provider_steam::SteamProfiles;
use sqlx::SqlitePool;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::spec::SourceSpec;
use crate::{CoreError, Result};

const EVENT_CAPACITY: usize = 1024;

/// Settings key for the Steam profile directory.
pub const STEAM_SETTINGS_KEY: &str = "steam";

struct ServiceInner {
    config: ImporterConfig,
    pool: SqlitePool,
    http_client: Arc<dyn HttpClient>,
    event_bus: EventBus,
    driver: SyncDriver,
    merge: MergePipeline,
}

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; every clone drives the same database and shares the
/// at-most-one-run-per-source guard.
#[derive(Clone)]
pub struct ImporterService {
    inner: Arc<ServiceInner>,
}

impl ImporterService {
    /// Open the configured database and build the native HTTP client.
    #[cfg(feature = "desktop-shims")]
    pub async fn new(config: ImporterConfig) -> Result<Self> {
        use bridge_desktop::ReqwestHttpClient;

        config.validate()?;
        let pool =
            core_store::create_pool(core_store::DatabaseConfig::new(&config.database_path)).await?;
        let http = ReqwestHttpClient::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

        Ok(Self::with_dependencies(config, pool, Arc::new(http)))
    }

    /// Build a service over an already migrated pool and any HTTP client.
    pub fn with_dependencies(
        config: ImporterConfig,
        pool: SqlitePool,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        let event_bus = EventBus::new(EVENT_CAPACITY);
        let driver = SyncDriver::new(
            pool.clone(),
            event_bus.clone(),
            DriverConfig::from(&config),
        );
        let merge = MergePipeline::new(pool.clone());

        Self {
            inner: Arc::new(ServiceInner {
                config,
                pool,
                http_client,
                event_bus,
                driver,
                merge,
            }),
        }
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.inner.event_bus.subscribe())
    }

    /// Settings for a walk: its own source id first, then its upstream, then the default.
    pub fn settings_for(&self, spec: &SourceSpec) -> &SourceSettings {
        let config = &self.inner.config;
        let id = spec.source_id();
        config
            .sources
            .get(id.as_str())
            .unwrap_or_else(|| config.source_settings(spec.provider()))
    }

    // ------------------------------------------------------------------------
    // Runs
    // ------------------------------------------------------------------------

    /// Run one source to completion.
    #[instrument(skip(self, cancel), fields(source = %spec.source_id()))]
    pub async fn run(&self, spec: SourceSpec, cancel: CancellationToken) -> Result<RunReport> {
        let settings = self.settings_for(&spec);
        let retry = self
            .inner
            .config
            .retry
            .policy()
            .with_pacing(settings.pacing_delay);
        let resolved = spec.resolve(self.inner.http_client.clone(), retry);
        let request = SyncRequest::new(resolved.adapter, resolved.normalizer, resolved.strategy)
            .with_settings(settings)
            .with_filters(resolved.filters);

        let report = self.inner.driver.run(request, cancel).await?;
        info!(
            status = %report.status,
            merged = report.stats.items_merged,
            failed = report.stats.items_failed,
            "Run finished"
        );
        Ok(report)
    }

    /// Run several sources concurrently. Results are returned in the order given.
    ///
    /// Walks sharing a source id still obey the one-run-per-source guard, so a
    /// duplicate fails with a sync-in-progress error.
    pub async fn run_many(
        &self,
        specs: Vec<SourceSpec>,
        cancel: CancellationToken,
    ) -> Vec<(SourceId, Result<RunReport>)> {
        let mut tasks = JoinSet::new();
        let ids: Vec<SourceId> = specs.iter().map(SourceSpec::source_id).collect();

        for (index, spec) in specs.into_iter().enumerate() {
            let service = self.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { (index, service.run(spec, cancel).await) });
        }

        let mut results: Vec<Option<Result<RunReport>>> = ids.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "Source task did not finish"),
            }
        }

        ids.into_iter()
            .zip(results)
            .map(|(id, result)| {
                let result = result
                    .unwrap_or_else(|| Err(CoreError::Task(format!("run of {} aborted", id))));
                (id, result)
            })
            .collect()
    }

    /// Request cancellation of a source's active run.
    pub fn cancel(&self, source: &SourceId) -> bool {
        self.inner.driver.cancel(source)
    }

    pub fn is_running(&self, source: &SourceId) -> bool {
        self.inner.driver.is_running(source)
    }

    pub async fn checkpoint(&self, source: &SourceId) -> Result<Option<Checkpoint>> {
        Ok(self.inner.driver.checkpoint(source).await?)
    }

    /// Past runs of a source, most recent first.
    pub async fn history(&self, source: &SourceId, limit: u32) -> Result<Vec<SyncRun>> {
        Ok(self.inner.driver.history(source, limit).await?)
    }

    // ------------------------------------------------------------------------
    // Players and links
    // ------------------------------------------------------------------------

    /// Refresh stored player names and avatars from Steam.
    ///
    /// # Errors
    ///
    /// [`CoreError::CapabilityMissing`] when no Steam API key is configured.
    #[instrument(skip(self, cancel))]
    pub async fn refresh_players(
        &self,
        walk: PlayerWalk,
        cancel: CancellationToken,
    ) -> Result<RefreshReport> {
        let config = &self.inner.config;
        let key = config
            .steam_api_key
            .clone()
            .ok_or_else(|| CoreError::CapabilityMissing {
                capability: "steam_api_key".to_string(),
                message: "player refresh needs a Steam Web API key".to_string(),
            })?;

        let pacing = config.source_settings(STEAM_SETTINGS_KEY).pacing_delay;
        let retry = config.retry.policy().with_pacing(pacing);
        let profiles = SteamProfiles::new(self.inner.http_client.clone(), retry, key);
        let refresh = PlayerRefresh::new(
            Arc::new(SqlitePlayerDirectory::new(self.inner.pool.clone())),
            Arc::new(profiles),
            Arc::new(self.inner.merge.clone()),
            self.inner.event_bus.clone(),
        )
        .with_pacing_delay(pacing);

        Ok(refresh.run(walk, &cancel).await?)
    }

    /// Record that a log's demo is known. Returns whether the link was new.
    pub async fn link_demo(&self, logid: u64, demoid: u64) -> Result<bool> {
        let linked = self.inner.merge.link_demo(logid, demoid).await?;
        if linked {
            self.inner
                .event_bus
                .emit(CoreEvent::Store(StoreEvent::DemoLinked { logid, demoid }))
                .ok();
        }
        Ok(linked)
    }

    pub async fn linked_demo(&self, logid: u64) -> Result<Option<u64>> {
        Ok(self.inner.merge.linked_demo(logid).await?)
    }
}
