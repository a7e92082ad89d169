use chrono::{DateTime, Utc};
use docsync_core::ClassifiedChange;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

/// Lifecycle of a queued change: `pending -> syncing -> {success | pending | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Syncing,
    Success,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Success | ItemStatus::Failed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Syncing => "syncing",
            ItemStatus::Success => "success",
            ItemStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub change: ClassifiedChange,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Backoff gate: a retried item is not selected before this instant.
    #[serde(skip)]
    pub(crate) not_before: Option<Instant>,
}

impl QueueItem {
    pub fn new(change: ClassifiedChange) -> Self {
        Self {
            id: Uuid::new_v4(),
            change,
            enqueued_at: Utc::now(),
            retry_count: 0,
            status: ItemStatus::Pending,
            last_error: None,
            not_before: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ItemStatus::Pending
    }

    pub(crate) fn is_ready(&self, now: Instant) -> bool {
        self.is_pending() && self.not_before.map_or(true, |gate| gate <= now)
    }
}

/// Immutable snapshot of an item that reached a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(flatten)]
    pub item: QueueItem,
    pub completed_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub(crate) fn new(item: QueueItem) -> Self {
        Self {
            item,
            completed_at: Utc::now(),
        }
    }

    pub fn status(&self) -> ItemStatus {
        self.item.status
    }
}
