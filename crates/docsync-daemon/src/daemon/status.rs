// ABOUTME: Status and metrics structures for the sync daemon
// ABOUTME: Tracks daemon state, per-session pipeline counters, and queue snapshots

use chrono::{DateTime, Utc};
use docsync_classifier::Classification;
use docsync_queue::QueueStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current daemon state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl std::fmt::Display for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonState::Stopped => write!(f, "Stopped"),
            DaemonState::Starting => write!(f, "Starting"),
            DaemonState::Running => write!(f, "Running"),
            DaemonState::Stopping => write!(f, "Stopping"),
            DaemonState::Error => write!(f, "Error"),
        }
    }
}

/// Counters for one capture -> classify -> enqueue session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Debounce cycles received from capture
    pub batches_captured: u64,
    /// Distinct paths handed to the classifier
    pub paths_seen: u64,
    /// Changes that survived classification
    pub changes_classified: u64,
    /// Low-priority, undocumented edits left out as noise
    pub changes_suppressed: u64,
    /// Paths skipped because their content could not be read
    pub read_errors: u64,
    /// Classified changes the queue rejected while paused
    pub changes_rejected: u64,
    pub last_batch_at: Option<DateTime<Utc>>,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_batch(&mut self, paths: u64, classification: &Classification, rejected: u64) {
        self.batches_captured += 1;
        self.paths_seen += paths;
        self.changes_classified += classification.changes.len() as u64;
        self.changes_suppressed += classification.suppressed as u64;
        self.read_errors += classification.unreadable as u64;
        self.changes_rejected += rejected;
        self.last_batch_at = Some(Utc::now());
    }
}

/// Complete daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub state: DaemonState,

    pub started_at: Option<DateTime<Utc>>,

    /// Directory being watched
    pub root: PathBuf,

    /// Watch patterns with a live subscription
    pub active_patterns: Vec<String>,

    pub metrics: SessionMetrics,

    pub queue: QueueStatus,
}

impl DaemonStatus {
    pub fn new(root: PathBuf) -> Self {
        Self {
            state: DaemonState::Stopped,
            started_at: None,
            root,
            active_patterns: Vec::new(),
            metrics: SessionMetrics::new(),
            queue: QueueStatus::default(),
        }
    }

    pub fn uptime(&self) -> Option<chrono::Duration> {
        self.started_at.map(|start| Utc::now() - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_metrics_record_batch() {
        let mut metrics = SessionMetrics::new();
        assert_eq!(metrics.batches_captured, 0);

        let classification = Classification {
            changes: Vec::new(),
            suppressed: 3,
            unreadable: 2,
        };
        metrics.record_batch(5, &classification, 0);
        assert_eq!(metrics.batches_captured, 1);
        assert_eq!(metrics.paths_seen, 5);
        assert_eq!(metrics.changes_classified, 0);
        assert_eq!(metrics.changes_suppressed, 3);
        assert_eq!(metrics.read_errors, 2);
        assert_eq!(metrics.changes_rejected, 0);
        assert!(metrics.last_batch_at.is_some());
    }

    #[test]
    fn test_daemon_status_new() {
        let status = DaemonStatus::new(PathBuf::from("/project"));
        assert_eq!(status.state, DaemonState::Stopped);
        assert!(status.uptime().is_none());
        assert_eq!(status.queue.text(), "Ready");
    }

    #[test]
    fn test_daemon_state_display() {
        assert_eq!(DaemonState::Running.to_string(), "Running");
        assert_eq!(DaemonState::Stopping.to_string(), "Stopping");
    }
}
