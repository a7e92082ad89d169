use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use docsync_core::{BackoffConfig, ClassifiedChange, DocSyncError, SyncConfig, SyncTransport};
use metrics::{counter, gauge, histogram};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::item::{HistoryRecord, ItemStatus, QueueItem};
use crate::status::QueueStatus;

pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type FailureCallback = Arc<dyn Fn(&FailureNotice) + Send + Sync>;

/// Tunables for [`SyncQueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Batch window after an `add`
    pub sync_delay: Duration,
    /// Pause between consecutive batches while work remains
    pub drain_delay: Duration,
    pub batch_size: usize,
    pub max_retries: u32,
    pub backoff: BackoffConfig,
    pub history_capacity: usize,
    /// Upper bound on a single transport call. `None` waits indefinitely.
    pub transport_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for QueueConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            sync_delay: config.sync_delay(),
            drain_delay: config.drain_delay(),
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            backoff: config.backoff.clone(),
            history_capacity: config.history_capacity,
            transport_timeout: config.transport_timeout(),
        }
    }
}

/// Raised once per item whose retry budget ran out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    pub path: PathBuf,
    pub error: String,
    pub retry_count: u32,
}

struct QueueState {
    items: Vec<QueueItem>,
    history: VecDeque<HistoryRecord>,
    is_paused: bool,
    is_processing: bool,
    timer: Option<JoinHandle<()>>,
    timer_generation: u64,
}

impl QueueState {
    fn pending_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_pending()).count()
    }

    fn snapshot(&self) -> QueueStatus {
        QueueStatus {
            is_paused: self.is_paused,
            is_processing: self.is_processing,
            queue_length: self.items.len(),
            pending_count: self.pending_count(),
            failed_count: self
                .history
                .iter()
                .filter(|r| r.status() == ItemStatus::Failed)
                .count(),
            history_count: self.history.len(),
        }
    }

    fn cancel_timer(&mut self) {
        self.timer_generation = self.timer_generation.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn push_history(&mut self, record: HistoryRecord, capacity: usize) {
        self.history.push_front(record);
        self.history.truncate(capacity);
    }
}

struct Inner {
    config: QueueConfig,
    transport: Arc<dyn SyncTransport>,
    state: Mutex<QueueState>,
    status_subscribers: RwLock<Vec<StatusCallback>>,
    failure_subscribers: RwLock<Vec<FailureCallback>>,
}

/// Deduplicating, priority-batched delivery queue.
///
/// Holds at most one pending item per path, delivers batches through a
/// [`SyncTransport`] with all-or-nothing semantics, retries failed batches
/// with exponential backoff and keeps a bounded most-recent-first history of
/// terminal items. Cloning yields another handle to the same queue.
///
/// Methods that may arm the batch timer (`add`, `resume`, `force_sync`) must
/// be called from within a tokio runtime.
#[derive(Clone)]
pub struct SyncQueue {
    inner: Arc<Inner>,
}

impl SyncQueue {
    /// A `max_retries` of zero is raised to one: every item gets at least
    /// one attempt and `retry_count` never exceeds the budget.
    pub fn new(mut config: QueueConfig, transport: Arc<dyn SyncTransport>) -> Self {
        if config.max_retries == 0 {
            warn!("max_retries of 0 allows no attempt, using 1");
            config.max_retries = 1;
        }
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                state: Mutex::new(QueueState {
                    items: Vec::new(),
                    history: VecDeque::new(),
                    is_paused: false,
                    is_processing: false,
                    timer: None,
                    timer_generation: 0,
                }),
                status_subscribers: RwLock::new(Vec::new()),
                failure_subscribers: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Enqueue a classified change. Returns `false` if the queue is paused
    /// and the change was dropped.
    pub fn add(&self, change: ClassifiedChange) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.is_paused {
                debug!("Queue paused, dropping change to {:?}", change.path);
                counter!("docsync_changes_dropped_paused").increment(1);
                return false;
            }

            match state
                .items
                .iter_mut()
                .find(|i| i.is_pending() && i.change.path == change.path)
            {
                Some(item) => {
                    debug!("Coalescing change to {:?}", change.path);
                    item.change = change;
                    item.enqueued_at = chrono::Utc::now();
                    counter!("docsync_changes_coalesced").increment(1);
                }
                None => {
                    debug!(
                        "Enqueued {} change to {:?} ({})",
                        change.kind, change.path, change.priority
                    );
                    state.items.push(QueueItem::new(change));
                    counter!("docsync_changes_enqueued").increment(1);
                }
            }
            gauge!("docsync_queue_pending").set(state.pending_count() as f64);

            if !state.is_processing {
                self.inner.arm_timer(&mut state, self.inner.config.sync_delay);
            }
        }
        self.inner.notify_status();
        true
    }

    /// Deliver one batch now. A no-op returning `false` when another batch
    /// is in flight or nothing is pending.
    pub async fn process_batch(&self) -> bool {
        self.inner.process_batch(false).await
    }

    /// Stop scheduling batches and drop incoming changes until `resume`.
    /// An in-flight batch still completes.
    pub fn pause(&self) {
        {
            let mut state = self.inner.state.lock();
            state.is_paused = true;
            state.cancel_timer();
        }
        info!("Sync queue paused");
        self.inner.notify_status();
    }

    pub fn resume(&self) {
        {
            let mut state = self.inner.state.lock();
            state.is_paused = false;
            if !state.is_processing {
                self.inner.arm_timer(&mut state, self.inner.config.sync_delay);
            }
        }
        info!("Sync queue resumed");
        self.inner.notify_status();
    }

    /// Unpause and deliver immediately, ignoring retry backoff.
    pub async fn force_sync(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            state.is_paused = false;
            state.cancel_timer();
        }
        let ran = self.inner.process_batch(true).await;
        if !ran {
            self.inner.notify_status();
        }
        ran
    }

    /// Drop every live item. History is kept.
    pub fn clear(&self) {
        let dropped = {
            let mut state = self.inner.state.lock();
            state.cancel_timer();
            let dropped = state.items.len();
            state.items.clear();
            gauge!("docsync_queue_pending").set(0.0);
            dropped
        };
        info!("Cleared {} queued items", dropped);
        self.inner.notify_status();
    }

    pub fn status(&self) -> QueueStatus {
        self.inner.state.lock().snapshot()
    }

    pub fn status_text(&self) -> String {
        self.status().text()
    }

    /// Terminal items, most recent first.
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.inner.state.lock().history.iter().cloned().collect()
    }

    /// Live items in enqueue order.
    pub fn queue(&self) -> Vec<QueueItem> {
        self.inner.state.lock().items.clone()
    }

    pub fn on_status_change<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.status_subscribers.write().push(Arc::new(callback));
    }

    pub fn on_failure<F>(&self, callback: F)
    where
        F: Fn(&FailureNotice) + Send + Sync + 'static,
    {
        self.inner.failure_subscribers.write().push(Arc::new(callback));
    }
}

impl Inner {
    /// Replace the batch timer. Fires after `delay`, or later if every
    /// pending item is still inside its backoff window.
    fn arm_timer(self: &Arc<Self>, state: &mut QueueState, delay: Duration) {
        state.cancel_timer();
        if state.is_paused {
            return;
        }

        let now = Instant::now();
        let Some(earliest) = state
            .items
            .iter()
            .filter(|i| i.is_pending())
            .map(|i| i.not_before.unwrap_or(now))
            .min()
        else {
            return;
        };
        let fire_at = (now + delay).max(earliest);

        let generation = state.timer_generation;
        let queue: Weak<Inner> = Arc::downgrade(self);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;
            if let Some(inner) = queue.upgrade() {
                inner.on_timer(generation).await;
            }
        }));
    }

    async fn on_timer(self: Arc<Self>, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.timer_generation != generation {
                return;
            }
            // Detach so a later cancel cannot abort the batch below.
            state.timer = None;
        }
        self.process_batch(false).await;
    }

    async fn process_batch(self: &Arc<Self>, ignore_backoff: bool) -> bool {
        let batch: Vec<QueueItem> = {
            let mut state = self.state.lock();
            if state.is_processing {
                debug!("Batch already in flight, skipping");
                return false;
            }

            let now = Instant::now();
            let mut selected: Vec<usize> = state
                .items
                .iter()
                .enumerate()
                .filter(|(_, i)| {
                    if ignore_backoff {
                        i.is_pending()
                    } else {
                        i.is_ready(now)
                    }
                })
                .map(|(idx, _)| idx)
                .collect();
            selected.sort_by_key(|&idx| state.items[idx].change.priority);
            selected.truncate(self.config.batch_size);
            if selected.is_empty() {
                return false;
            }

            state.is_processing = true;
            selected
                .into_iter()
                .map(|idx| {
                    let item = &mut state.items[idx];
                    item.status = ItemStatus::Syncing;
                    item.not_before = None;
                    item.clone()
                })
                .collect()
        };
        self.notify_status();

        let changes: Vec<ClassifiedChange> = batch.iter().map(|i| i.change.clone()).collect();
        debug!("Syncing batch of {} changes", changes.len());

        let started = std::time::Instant::now();
        let outcome = match self.config.transport_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.transport.sync_changes(&changes)).await {
                    Ok(result) => result,
                    Err(_) => Err(DocSyncError::Timeout(limit.as_millis() as u64)),
                }
            }
            None => self.transport.sync_changes(&changes).await,
        };
        histogram!("docsync_batch_duration_seconds").record(started.elapsed());

        let notices = {
            let mut state = self.state.lock();
            let notices = match outcome {
                Ok(()) => {
                    self.complete_batch(&mut state, batch);
                    Vec::new()
                }
                Err(e) => self.fail_batch(&mut state, batch, &e.to_string()),
            };
            state.is_processing = false;
            gauge!("docsync_queue_pending").set(state.pending_count() as f64);

            if !state.is_paused && state.pending_count() > 0 {
                self.arm_timer(&mut state, self.config.drain_delay);
            }
            notices
        };

        for notice in &notices {
            warn!(
                "Giving up on {:?} after {} attempts: {}",
                notice.path, notice.retry_count, notice.error
            );
            self.notify_failure(notice);
        }
        self.notify_status();
        true
    }

    fn complete_batch(&self, state: &mut QueueState, batch: Vec<QueueItem>) {
        let synced = batch.len();
        for mut snapshot in batch {
            state.items.retain(|i| i.id != snapshot.id);
            snapshot.status = ItemStatus::Success;
            state.push_history(HistoryRecord::new(snapshot), self.config.history_capacity);
        }
        counter!("docsync_changes_synced").increment(synced as u64);
        info!("Synced {} changes", synced);
    }

    fn fail_batch(
        &self,
        state: &mut QueueState,
        batch: Vec<QueueItem>,
        error: &str,
    ) -> Vec<FailureNotice> {
        warn!("Batch of {} changes failed: {}", batch.len(), error);
        let mut notices = Vec::new();

        for snapshot in batch {
            let Some(pos) = state.items.iter().position(|i| i.id == snapshot.id) else {
                debug!("{:?} was cleared while syncing", snapshot.change.path);
                continue;
            };
            let superseded = state
                .items
                .iter()
                .any(|i| i.is_pending() && i.change.path == snapshot.change.path);

            let item = &mut state.items[pos];
            item.retry_count += 1;
            item.last_error = Some(error.to_string());
            let retry_count = item.retry_count;

            if retry_count < self.config.max_retries {
                if superseded {
                    debug!(
                        "Dropping retry of {:?}, a newer change is pending",
                        snapshot.change.path
                    );
                    state.items.remove(pos);
                    continue;
                }
                let backoff = self.config.backoff.delay_for(retry_count);
                item.status = ItemStatus::Pending;
                item.not_before = Some(Instant::now() + backoff);
                counter!("docsync_changes_retried").increment(1);
                debug!(
                    "Retrying {:?} in {:?} (attempt {}/{})",
                    item.change.path, backoff, retry_count, self.config.max_retries
                );
            } else {
                item.status = ItemStatus::Failed;
                let failed = state.items.remove(pos);
                notices.push(FailureNotice {
                    path: failed.change.path.clone(),
                    error: error.to_string(),
                    retry_count,
                });
                state.push_history(HistoryRecord::new(failed), self.config.history_capacity);
                counter!("docsync_changes_failed").increment(1);
            }
        }
        notices
    }

    fn notify_status(&self) {
        let text = self.state.lock().snapshot().text();
        let subscribers: Vec<StatusCallback> = self.status_subscribers.read().clone();
        for subscriber in subscribers {
            subscriber(&text);
        }
    }

    fn notify_failure(&self, notice: &FailureNotice) {
        let subscribers: Vec<FailureCallback> = self.failure_subscribers.read().clone();
        for subscriber in subscribers {
            subscriber(notice);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            timer.abort();
        }
    }
}
