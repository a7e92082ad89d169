// ABOUTME: Sync session that connects ChangeCapture, ChangeClassifier and SyncQueue
// ABOUTME: Turns debounced change groups into classified, queued deliveries

use anyhow::{Context, Result};
use docsync_classifier::ChangeClassifier;
use docsync_core::{ChangeGroups, DocSyncConfig, SyncTransport};
use docsync_queue::{QueueConfig, SyncQueue};
use docsync_watch::ChangeCapture;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use super::status::SessionMetrics;

/// Sync session - owns the capture subscriptions and the queue they feed
pub struct SyncSession {
    capture: ChangeCapture,

    /// Debounced groups from the capture loop
    changes: UnboundedReceiver<ChangeGroups>,

    classifier: ChangeClassifier,

    queue: SyncQueue,

    metrics: SessionMetrics,
}

impl SyncSession {
    /// Create and start a session. Must run inside a tokio runtime.
    pub fn new(config: &DocSyncConfig, transport: Arc<dyn SyncTransport>) -> Result<Self> {
        let root = config.sync.root_or_cwd();
        if !root.is_dir() {
            anyhow::bail!("Watch root {:?} is not a directory", root);
        }

        let (mut capture, changes) = ChangeCapture::new(&root, config.sync.sync_delay());
        let active = capture
            .start(
                config.sync.watch_patterns.as_slice(),
                config.sync.ignore_patterns.as_slice(),
            )
            .context("Failed to start change capture")?;
        if active == 0 && !config.sync.watch_patterns.is_empty() {
            anyhow::bail!(
                "None of the {} watch patterns could be subscribed",
                config.sync.watch_patterns.len()
            );
        }

        let classifier =
            ChangeClassifier::new(config.classifier.clone()).with_root(capture.root());

        let queue = SyncQueue::new(QueueConfig::from(&config.sync), transport);
        queue.on_status_change(|text| debug!("Sync status: {}", text));

        info!(
            "Sync session initialized: {} patterns in {:?}",
            active,
            capture.root()
        );

        Ok(Self {
            capture,
            changes,
            classifier,
            queue,
            metrics: SessionMetrics::new(),
        })
    }

    pub fn root(&self) -> &Path {
        self.capture.root()
    }

    pub fn capture(&self) -> &ChangeCapture {
        &self.capture
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn active_patterns(&self) -> Vec<String> {
        self.capture
            .active_patterns()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Wait for the next debounced group of changes
    pub async fn next_batch(&mut self) -> Option<ChangeGroups> {
        self.changes.recv().await
    }

    /// Classify a captured batch and enqueue what survives.
    /// Returns the number of changes the queue accepted.
    pub async fn process_batch(&mut self, groups: ChangeGroups) -> usize {
        let paths = groups.len() as u64;
        let classification = self.classifier.classify_counted(groups).await;
        let classified = classification.changes.len() as u64;

        let mut accepted = 0;
        for change in &classification.changes {
            if self.queue.add(change.clone()) {
                accepted += 1;
            }
        }
        let rejected = classified - accepted as u64;
        if rejected > 0 {
            warn!("Queue paused, {} classified changes discarded", rejected);
        }

        self.metrics.record_batch(paths, &classification, rejected);
        debug!(
            "Captured {} paths: {} classified, {} suppressed, {} unreadable, {} queued",
            paths, classified, classification.suppressed, classification.unreadable, accepted
        );
        accepted
    }

    /// Stop the capture subscriptions. Queued items are left in place.
    pub fn stop(&mut self) {
        self.capture.stop();
        let pending = self.queue.status().pending_count;
        if pending > 0 {
            warn!("Stopping with {} changes not yet synced", pending);
        }
    }
}
