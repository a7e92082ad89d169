pub mod item;
pub mod queue;
pub mod status;

pub use item::{HistoryRecord, ItemStatus, QueueItem};
pub use queue::{FailureNotice, QueueConfig, SyncQueue};
pub use status::QueueStatus;
