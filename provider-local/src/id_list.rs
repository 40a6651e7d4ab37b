//! Explicit id list over another source
//!
//! Lists a fixed set of ids supplied by the caller and resolves each one
//! through the wrapped adapter. Used to re-import specific logs or demos.

use async_trait::async_trait;
use bridge_traits::{
    FetchError, ItemEnvelope, ItemId, Page, PageParams, PayloadMode, RawPayload, SourceAdapter,
    SourceCapabilities, SourceId,
};
use serde_json::Value;
use std::sync::Arc;

use crate::directory::LOCAL_PAGE_SIZE;

pub struct IdListSource {
    id: SourceId,
    inner: Arc<dyn SourceAdapter>,
    ids: Vec<u64>,
}

impl IdListSource {
    /// Ids are listed in the order given. The source id defaults to the inner
    /// source's id with a `/list` suffix.
    pub fn new(inner: Arc<dyn SourceAdapter>, ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            id: SourceId::new(format!("{}/list", inner.source_id())),
            inner,
            ids: ids.into_iter().collect(),
        }
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.id = SourceId::new(id);
        self
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }
}

#[async_trait]
impl SourceAdapter for IdListSource {
    fn source_id(&self) -> &SourceId {
        &self.id
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            max_page_size: LOCAL_PAGE_SIZE,
            payload: PayloadMode::Separate,
            remote: self.inner.capabilities().remote,
        }
    }

    async fn list_page(&self, params: &PageParams) -> Result<Page, FetchError> {
        let total = self.ids.len() as u64;
        let items = self
            .ids
            .iter()
            .skip(params.offset.min(total) as usize)
            .take(params.limit as usize)
            .map(|&id| ItemEnvelope::new(id, 0, Value::Null))
            .collect();

        Ok(Page {
            items,
            total: Some(total),
            offset: params.offset,
            skipped: 0,
        })
    }

    async fn fetch_payload(&self, id: ItemId) -> Result<RawPayload, FetchError> {
        self.inner.fetch_payload(id).await
    }
}
