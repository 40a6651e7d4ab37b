//! Item fetch stage.
//!
//! Resolves a listed item to its full payload. Sources that embed the record in
//! the listing skip the network entirely; the rest make one paced request per
//! item through the adapter, which applies the shared retry policy.

use bridge_traits::{FetchError, ItemEnvelope, PayloadMode, RawPayload, SourceAdapter};
use tracing::{debug, warn};

use crate::pacing::Pacer;

pub struct ItemFetchStage<'a> {
    adapter: &'a dyn SourceAdapter,
    mode: PayloadMode,
}

impl<'a> ItemFetchStage<'a> {
    pub fn new(adapter: &'a dyn SourceAdapter) -> Self {
        Self {
            mode: adapter.capabilities().payload,
            adapter,
        }
    }

    pub fn mode(&self) -> PayloadMode {
        self.mode
    }

    pub async fn fetch(
        &self,
        envelope: &ItemEnvelope,
        pacer: &mut Pacer,
    ) -> Result<RawPayload, FetchError> {
        match self.mode {
            PayloadMode::Embedded => Ok(RawPayload {
                id: envelope.id,
                body: envelope.raw.clone(),
                fetched_at: chrono::Utc::now().timestamp(),
            }),
            PayloadMode::Separate => {
                pacer.wait().await;
                debug!(source = %self.adapter.source_id(), item_id = %envelope.id, "Fetching payload");

                self.adapter.fetch_payload(envelope.id).await.map_err(|e| {
                    warn!(
                        source = %self.adapter.source_id(),
                        item_id = %envelope.id,
                        attempts = attempts(&e),
                        error = %e,
                        "Payload fetch failed"
                    );
                    e
                })
            }
        }
    }
}

/// Attempts spent on a request that ended in `err`.
pub fn attempts(err: &FetchError) -> u32 {
    match err {
        FetchError::Exhausted { attempts, .. } => *attempts,
        _ => 1,
    }
}
