//! ETF2L API connector
//!
//! Two feeds share one adapter: league results and the transfer history of a
//! single team. Both are page-numbered (`/{page}.json`, 100 per page) and
//! bounded by `page.total_pages`. Entries are complete in the listing, so the
//! adapter embeds them in the envelopes and never issues per-item requests.

use async_trait::async_trait;
use bridge_traits::{
    fetch_json, FetchError, HttpClient, HttpRequest, ItemEnvelope, ItemId, Page, PageParams,
    PayloadMode, RawPayload, RetryPolicy, SourceAdapter, SourceCapabilities, SourceId,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{Etf2lError, Result};
use crate::types::FeedPage;

/// ETF2L API base URL
pub const ETF2L_API: &str = "https://api.etf2l.org";

/// Entries per page requested from the API
pub const PER_PAGE: u32 = 100;

/// Which ETF2L collection an adapter walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Etf2lFeed {
    Results,
    Transfers { teamid: u64 },
}

impl Etf2lFeed {
    /// Source id used to key checkpoints.
    pub fn source_id(&self) -> String {
        match self {
            Etf2lFeed::Results => "etf2l/results".to_string(),
            Etf2lFeed::Transfers { teamid } => format!("etf2l/transfers/{}", teamid),
        }
    }

    fn path(&self) -> String {
        match self {
            Etf2lFeed::Results => "results".to_string(),
            Etf2lFeed::Transfers { teamid } => format!("team/{}/transfers", teamid),
        }
    }
}

/// ETF2L source adapter
pub struct Etf2lSource {
    id: SourceId,
    feed: Etf2lFeed,
    http_client: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    base_url: String,
}

impl Etf2lSource {
    pub fn new(feed: Etf2lFeed, http_client: Arc<dyn HttpClient>, retry: RetryPolicy) -> Self {
        Self {
            id: SourceId::new(feed.source_id()),
            feed,
            http_client,
            retry,
            base_url: ETF2L_API.to_string(),
        }
    }

    pub fn results(http_client: Arc<dyn HttpClient>, retry: RetryPolicy) -> Self {
        Self::new(Etf2lFeed::Results, http_client, retry)
    }

    pub fn transfers(teamid: u64, http_client: Arc<dyn HttpClient>, retry: RetryPolicy) -> Self {
        Self::new(Etf2lFeed::Transfers { teamid }, http_client, retry)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn feed(&self) -> Etf2lFeed {
        self.feed
    }

    /// Fetch one page (1-based) and return its entries, stamped with `fetched`
    /// and, for transfers, the team id, plus the page count.
    #[instrument(skip(self), fields(source = %self.id))]
    pub async fn fetch_page(&self, page: u64, since: i64) -> Result<(Vec<Value>, u64)> {
        let url = format!("{}/{}/{}.json", self.base_url, self.feed.path(), page);
        let request = HttpRequest::get(url.clone())
            .header("Accept", "application/json")
            .query("per_page", PER_PAGE)
            .query("since", since);

        let fetched = chrono::Utc::now().timestamp();
        let body: FeedPage = fetch_json(self.http_client.as_ref(), request, &self.retry).await?;
        let total_pages = body
            .page
            .as_ref()
            .map(|info| info.total_pages)
            .ok_or(Etf2lError::MissingPage { url })?;

        let entries = match self.feed {
            Etf2lFeed::Results => body.results,
            Etf2lFeed::Transfers { .. } => body.transfers,
        }
        .unwrap_or_default();

        let entries = entries
            .into_iter()
            .map(|mut entry| {
                if let Value::Object(fields) = &mut entry {
                    fields.insert("fetched".to_string(), fetched.into());
                    if let Etf2lFeed::Transfers { teamid } = self.feed {
                        fields.insert("teamid".to_string(), teamid.into());
                    }
                }
                entry
            })
            .collect::<Vec<_>>();

        debug!(page, total_pages, returned = entries.len(), "Fetched ETF2L page");
        Ok((entries, total_pages))
    }

    fn envelope(&self, position: u64, entry: Value) -> Option<ItemEnvelope> {
        let created_at = entry.get("time").and_then(Value::as_i64).unwrap_or(0);
        let id = match self.feed {
            Etf2lFeed::Results => entry.get("id").and_then(Value::as_u64)?,
            // Transfers have no id of their own
            Etf2lFeed::Transfers { .. } => position + 1,
        };
        Some(ItemEnvelope::new(id, created_at, entry))
    }
}

#[async_trait]
impl SourceAdapter for Etf2lSource {
    fn source_id(&self) -> &SourceId {
        &self.id
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            max_page_size: PER_PAGE,
            payload: PayloadMode::Embedded,
            remote: true,
        }
    }

    async fn list_page(&self, params: &PageParams) -> std::result::Result<Page, FetchError> {
        let per_page = PER_PAGE as u64;
        let page = params.offset / per_page + 1;
        let skip = params.offset % per_page;
        let since = params.since.unwrap_or(0);

        let (entries, total_pages) = self.fetch_page(page, since).await?;
        let available = entries.len() as u64;

        let mut items = Vec::new();
        let mut skipped = 0;
        for (index, entry) in entries
            .into_iter()
            .enumerate()
            .skip(skip as usize)
            .take(params.limit as usize)
        {
            let position = (page - 1) * per_page + index as u64;
            match self.envelope(position, entry) {
                Some(item) => items.push(item),
                None => {
                    warn!(source = %self.id, page, position, "Skipping ETF2L entry without id");
                    skipped += 1;
                }
            }
        }

        let total = (page >= total_pages).then(|| (page - 1) * per_page + available);

        Ok(Page {
            items,
            total,
            offset: params.offset,
            skipped,
        })
    }

    async fn fetch_payload(&self, id: ItemId) -> std::result::Result<RawPayload, FetchError> {
        Err(FetchError::fatal(format!(
            "{} embeds entries in its listing; no payload request for {}",
            self.id, id
        )))
    }
}
