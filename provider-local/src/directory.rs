//! Directory of JSON documents
//!
//! Each item is a file named `<id>.json`. Files with any other name are
//! ignored. The listing is built once per adapter, in ascending id order, and
//! paged from memory.

use async_trait::async_trait;
use bridge_traits::{
    FetchError, ItemEnvelope, ItemId, Page, PageParams, PayloadMode, RawPayload, SourceAdapter,
    SourceCapabilities, SourceId,
};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::error::{LocalError, Result};

/// Page size for local listings
pub const LOCAL_PAGE_SIZE: u32 = 1000;

fn item_id(path: &Path) -> Option<u64> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

/// Source over a directory of `<id>.json` files.
pub struct JsonDirectorySource {
    id: SourceId,
    dir: PathBuf,
    ids: OnceCell<Vec<u64>>,
}

impl JsonDirectorySource {
    pub fn new(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            id: SourceId::new(id),
            dir: dir.into(),
            ids: OnceCell::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn scan(&self) -> Result<Vec<u64>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(source = %self.id, dir = ?self.dir, "Directory does not exist, nothing to list");
                return Ok(Vec::new());
            }
            Err(e) => return Err(LocalError::io(&self.dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LocalError::io(&self.dir, e))?
        {
            match item_id(&entry.path()) {
                Some(id) => ids.push(id),
                None => debug!(path = ?entry.path(), "Skipping file without an id name"),
            }
        }
        ids.sort_unstable();
        ids.dedup();

        debug!(source = %self.id, count = ids.len(), "Scanned directory");
        Ok(ids)
    }

    async fn ids(&self) -> Result<&[u64]> {
        self.ids
            .get_or_try_init(|| self.scan())
            .await
            .map(Vec::as_slice)
    }

    /// Read and parse one document.
    #[instrument(skip(self), fields(source = %self.id))]
    pub async fn read_document(&self, id: u64) -> Result<Value> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LocalError::NotFound {
                    id,
                    location: self.dir.display().to_string(),
                })
            }
            Err(e) => return Err(LocalError::io(path, e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| LocalError::Json {
            path,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl SourceAdapter for JsonDirectorySource {
    fn source_id(&self) -> &SourceId {
        &self.id
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            max_page_size: LOCAL_PAGE_SIZE,
            payload: PayloadMode::Separate,
            remote: false,
        }
    }

    async fn list_page(&self, params: &PageParams) -> std::result::Result<Page, FetchError> {
        let ids = self.ids().await?;
        let total = ids.len() as u64;

        let items = ids
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

    async fn fetch_payload(&self, id: ItemId) -> std::result::Result<RawPayload, FetchError> {
        let body = self.read_document(id.get()).await?;
        Ok(RawPayload {
            id,
            body,
            fetched_at: chrono::Utc::now().timestamp(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_from_file_name() {
        assert_eq!(item_id(Path::new("/logs/2500001.json")), Some(2_500_001));
        assert_eq!(item_id(Path::new("/logs/2500001.json.bak")), None);
        assert_eq!(item_id(Path::new("/logs/notes.json")), None);
        assert_eq!(item_id(Path::new("/logs/17")), None);
    }

    #[tokio::test]
    async fn test_missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonDirectorySource::new("logs/files", dir.path().join("absent"));

        let page = source.list_page(&PageParams::new(0, 100)).await.unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total, Some(0));
        assert!(!source.capabilities().remote);
    }
}
