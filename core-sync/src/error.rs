use bridge_traits::FetchError;
use core_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Listing failed: {0}")]
    Listing(FetchError),

    #[error("Fetching item {item_id} failed: {source}")]
    Fetch {
        item_id: u64,
        #[source]
        source: FetchError,
    },

    #[error("Item {item_id} could not be parsed: {message}")]
    Parse { item_id: u64, message: String },

    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("Player refresh aborted: {0}")]
    Refresh(FetchError),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Sync timeout after {0} seconds")]
    Timeout(u64),

    #[error("Sync already in progress for source {source_id}")]
    SyncInProgress { source_id: String },

    #[error("Sync run {run_id} not found")]
    RunNotFound { run_id: String },

    #[error("Invalid run ID: {0}")]
    InvalidRunId(String),

    #[error("Invalid run status: {0}")]
    InvalidStatus(String),

    #[error("Invalid cursor strategy: {0}")]
    InvalidStrategy(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Merge { .. } => SyncError::Merge(err.to_string()),
            other => SyncError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
