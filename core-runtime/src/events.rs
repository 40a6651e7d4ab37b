//! # Event Bus System
//!
//! Provides an event-driven channel for run progress using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: `CoreEvent` wrapping per-domain enums (`SyncEvent`, `StoreEvent`)
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Sync Driver  ├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//! ┌──────────────┐     emit      │           │                  └────────────┘
//! │ Merge / Link ├──────────────>│           │
//! └──────────────┘               └───────────┘
//! ```
//!
//! Emitting with no subscribers is not an error for producers; they ignore the
//! `SendError`.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Started {
//!         run_id: "run-1".to_string(),
//!         source: "logs.tf".to_string(),
//!         strategy: "incremental".to_string(),
//!     }))
//!     .ok();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError};

pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Synchronization run events
    Sync(SyncEvent),
    /// Store mutations outside the per-run merge
    Store(StoreEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Store(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::ItemFailed { .. })
            | CoreEvent::Sync(SyncEvent::BatchRolledBack { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. })
            | CoreEvent::Store(StoreEvent::CheckpointSaved { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted by the synchronization driver, one run at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Run initiated.
    Started {
        run_id: String,
        source: String,
        /// Cursor strategy in use ("incremental", "reverse", "enumerate").
        strategy: String,
    },
    /// A listing page was consumed.
    PageListed {
        run_id: String,
        source: String,
        offset: u64,
        total: Option<u64>,
        fresh_items: u64,
    },
    /// One item could not be fetched, parsed or merged and was skipped.
    ItemFailed {
        run_id: String,
        source: String,
        item_id: u64,
        /// "fetch", "parse" or "merge".
        stage: String,
        attempts: u32,
        message: String,
    },
    /// A merge transaction committed.
    BatchCommitted {
        run_id: String,
        source: String,
        items: u64,
    },
    /// A merge transaction rolled back; its items were discarded.
    BatchRolledBack {
        run_id: String,
        source: String,
        items: u64,
        message: String,
    },
    /// Run finished and its checkpoint was persisted.
    Completed {
        run_id: String,
        source: String,
        items_merged: u64,
        items_failed: u64,
        duration_secs: u64,
    },
    /// Run aborted; checkpoint unchanged.
    Failed {
        run_id: String,
        source: String,
        message: String,
        items_merged: u64,
    },
    /// Run cancelled; checkpoint unchanged.
    Cancelled {
        run_id: String,
        source: String,
        items_merged: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::PageListed { .. } => "Listing page consumed",
            SyncEvent::ItemFailed { .. } => "Item skipped",
            SyncEvent::BatchCommitted { .. } => "Batch committed",
            SyncEvent::BatchRolledBack { .. } => "Batch rolled back",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::Cancelled { .. } => "Sync cancelled",
        }
    }
}

// ============================================================================
// Store Events
// ============================================================================

/// Events about persisted state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum StoreEvent {
    /// A source checkpoint advanced.
    CheckpointSaved {
        source: String,
        since: i64,
        last_seen_id: Option<u64>,
        offset: u64,
    },
    /// A log was linked to its demo.
    DemoLinked { logid: u64, demoid: u64 },
    /// A player refresh pass finished.
    PlayersRefreshed { updated: u64, failed_batches: u64 },
}

impl StoreEvent {
    fn description(&self) -> &str {
        match self {
            StoreEvent::CheckpointSaved { .. } => "Checkpoint saved",
            StoreEvent::DemoLinked { .. } => "Demo linked",
            StoreEvent::PlayersRefreshed { .. } => "Players refreshed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Drains every currently buffered event that passes the filter.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.as_ref().map_or(true, |f| f(&event)) {
                        events.push(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return events,
            }
        }
    }
}
