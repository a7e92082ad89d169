use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub is_paused: bool,
    pub is_processing: bool,
    pub queue_length: usize,
    pub pending_count: usize,
    pub failed_count: usize,
    pub history_count: usize,
}

impl QueueStatus {
    /// Coarse status line shown to users.
    pub fn text(&self) -> String {
        if self.is_paused {
            "Paused".to_string()
        } else if self.is_processing {
            "Syncing...".to_string()
        } else if self.pending_count > 0 {
            format!("{} pending", self.pending_count)
        } else {
            "Ready".to_string()
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}
