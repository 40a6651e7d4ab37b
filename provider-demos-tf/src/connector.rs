//! demos.tf API connector
//!
//! The listing endpoint is page-numbered with a fixed page size of 50 and no
//! total. Offsets from the pager are mapped onto page numbers; an offset that
//! falls inside a page skips the entries before it.

use async_trait::async_trait;
use bridge_traits::{
    fetch_json, FetchError, HttpClient, HttpRequest, ItemEnvelope, ItemId, Page, PageParams,
    PayloadMode, RawPayload, RetryPolicy, SourceAdapter, SourceCapabilities, SourceId,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{DemosTfError, Result};
use crate::types::DemoSummary;

/// demos.tf API base URL
pub const DEMOS_TF_API: &str = "https://api.demos.tf";

/// Entries per listing page. Fixed by the API.
pub const PAGE_SIZE: u32 = 50;

/// Default source id, used to key checkpoints
pub const SOURCE_ID: &str = "demos.tf";

/// Map a zero-based item offset to a one-based page number and the number of
/// entries to skip on that page.
pub fn page_for_offset(offset: u64) -> (u64, usize) {
    let size = PAGE_SIZE as u64;
    (offset / size + 1, (offset % size) as usize)
}

/// demos.tf source adapter
pub struct DemosTfSource {
    id: SourceId,
    http_client: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    base_url: String,
}

impl DemosTfSource {
    pub fn new(http_client: Arc<dyn HttpClient>, retry: RetryPolicy) -> Self {
        Self {
            id: SourceId::new(SOURCE_ID),
            http_client,
            retry,
            base_url: DEMOS_TF_API.to_string(),
        }
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.id = SourceId::new(id);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch one listing page by page number.
    #[instrument(skip(self), fields(source = %self.id))]
    pub async fn list_demos(
        &self,
        page: u64,
        after: Option<i64>,
        before: Option<i64>,
    ) -> Result<Vec<DemoSummary>> {
        let request = HttpRequest::get(format!("{}/demos", self.base_url))
            .header("Accept", "application/json")
            .query("page", page)
            .query_opt("after", after)
            .query_opt("before", before);

        let demos: Vec<DemoSummary> =
            fetch_json(self.http_client.as_ref(), request, &self.retry).await?;
        debug!(page, returned = demos.len(), "Listed demos");
        Ok(demos)
    }

    /// Fetch one demo with its player list.
    #[instrument(skip(self), fields(source = %self.id))]
    pub async fn fetch_demo(&self, demoid: u64) -> Result<Value> {
        let request = HttpRequest::get(format!("{}/demos/{}", self.base_url, demoid))
            .header("Accept", "application/json");
        let body: Value = fetch_json(self.http_client.as_ref(), request, &self.retry).await?;

        match body.get("id").and_then(Value::as_u64) {
            Some(id) if id == demoid => Ok(body),
            Some(other) => Err(DemosTfError::InvalidDemo {
                id: demoid,
                message: format!("response describes demo {}", other),
            }),
            None => Err(DemosTfError::InvalidDemo {
                id: demoid,
                message: "response has no id".to_string(),
            }),
        }
    }
}

#[async_trait]
impl SourceAdapter for DemosTfSource {
    fn source_id(&self) -> &SourceId {
        &self.id
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            max_page_size: PAGE_SIZE,
            payload: PayloadMode::Separate,
            remote: true,
        }
    }

    async fn list_page(&self, params: &PageParams) -> std::result::Result<Page, FetchError> {
        let (page, skip) = page_for_offset(params.offset);
        let since = params.since.filter(|since| *since > 0);
        let demos = self.list_demos(page, since, params.until).await?;

        let items = demos
            .into_iter()
            .skip(skip)
            .take(params.limit as usize)
            .map(|demo| {
                let raw = serde_json::to_value(&demo).unwrap_or_default();
                ItemEnvelope::new(demo.id, demo.time, raw)
            })
            .collect();

        Ok(Page {
            items,
            total: None,
            offset: params.offset,
            skipped: 0,
        })
    }

    async fn fetch_payload(&self, id: ItemId) -> std::result::Result<RawPayload, FetchError> {
        let body = self.fetch_demo(id.get()).await?;
        Ok(RawPayload {
            id,
            body,
            fetched_at: chrono::Utc::now().timestamp(),
        })
    }
}
