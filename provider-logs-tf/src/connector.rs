//! logs.tf API connector
//!
//! Implements [`SourceAdapter`] over the public logs.tf API. The listing is
//! ordered newest first and reports a total, so the same adapter serves both
//! the incremental walk and the reverse backfill.

use async_trait::async_trait;
use bridge_traits::{
    fetch_json, FetchError, HttpClient, HttpRequest, ItemEnvelope, ItemId, Page, PageParams,
    PayloadMode, RawPayload, RetryPolicy, SourceAdapter, SourceCapabilities, SourceId,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{LogsTfError, Result};
use crate::types::LogListResponse;

/// logs.tf API base URL
pub const LOGS_TF_API: &str = "https://logs.tf/api/v1";

/// Largest `limit` the listing endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Default source id, used to key checkpoints
pub const SOURCE_ID: &str = "logs.tf";

/// logs.tf source adapter
///
/// # Example
///
/// ```ignore
/// use provider_logs_tf::LogsTfSource;
///
/// let source = LogsTfSource::new(http_client, RetryPolicy::default());
/// let page = source.list_page(&PageParams::new(0, 1000)).await?;
/// ```
pub struct LogsTfSource {
    id: SourceId,
    http_client: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    base_url: String,
}

impl LogsTfSource {
    pub fn new(http_client: Arc<dyn HttpClient>, retry: RetryPolicy) -> Self {
        Self {
            id: SourceId::new(SOURCE_ID),
            http_client,
            retry,
            base_url: LOGS_TF_API.to_string(),
        }
    }

    /// Use a different source id, so that two walks over logs.tf keep separate
    /// checkpoints.
    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.id = SourceId::new(id);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn list_request(&self, params: &PageParams) -> HttpRequest {
        let players = (!params.players.is_empty()).then(|| {
            params
                .players
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",")
        });

        HttpRequest::get(format!("{}/log", self.base_url))
            .header("Accept", "application/json")
            .query("offset", params.offset)
            .query("limit", params.limit.min(MAX_PAGE_SIZE))
            .query_opt("player", players)
    }

    /// Fetch one listing page.
    #[instrument(skip(self), fields(source = %self.id))]
    pub async fn list_logs(&self, params: &PageParams) -> Result<LogListResponse> {
        let request = self.list_request(params);
        let response: LogListResponse =
            fetch_json(self.http_client.as_ref(), request, &self.retry).await?;

        if !response.success {
            return Err(LogsTfError::Api(
                response
                    .error
                    .unwrap_or_else(|| "listing reported failure".to_string()),
            ));
        }
        if let Some(bad) = response.logs.iter().find(|log| log.id == 0) {
            return Err(LogsTfError::InvalidListing(format!(
                "log without id dated {}",
                bad.date
            )));
        }

        debug!(
            offset = params.offset,
            returned = response.logs.len(),
            total = ?response.total,
            "Listed logs"
        );
        Ok(response)
    }

    /// Fetch the full v3 document of one log.
    #[instrument(skip(self), fields(source = %self.id))]
    pub async fn fetch_log(&self, logid: u64) -> Result<Value> {
        let request = HttpRequest::get(format!("{}/log/{}", self.base_url, logid))
            .header("Accept", "application/json");
        let body: Value = fetch_json(self.http_client.as_ref(), request, &self.retry).await?;

        match body.get("success").and_then(Value::as_bool) {
            Some(true) => Ok(body),
            _ => {
                let message = body
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("log reported failure");
                Err(LogsTfError::Api(format!("log {}: {}", logid, message)))
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for LogsTfSource {
    fn source_id(&self) -> &SourceId {
        &self.id
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            max_page_size: MAX_PAGE_SIZE,
            payload: PayloadMode::Separate,
            remote: true,
        }
    }

    async fn list_page(&self, params: &PageParams) -> std::result::Result<Page, FetchError> {
        let response = self.list_logs(params).await?;

        let items = response
            .logs
            .into_iter()
            .map(|log| {
                let raw = serde_json::to_value(&log).unwrap_or_default();
                ItemEnvelope::new(log.id, log.date, raw)
            })
            .collect();

        Ok(Page {
            items,
            total: response.total,
            offset: params.offset,
            skipped: 0,
        })
    }

    async fn fetch_payload(&self, id: ItemId) -> std::result::Result<RawPayload, FetchError> {
        let body = self.fetch_log(id.get()).await?;
        Ok(RawPayload {
            id,
            body,
            fetched_at: chrono::Utc::now().timestamp(),
        })
    }
}
