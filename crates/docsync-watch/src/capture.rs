use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use docsync_core::{ChangeGroups, ChangeKind, DocSyncError, RawChangeEvent, Result};
use globset::{GlobMatcher, GlobSet};
use notify::{
    event::{ModifyKind, RenameMode},
    Event, EventKind, RecommendedWatcher, Watcher,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::pattern;

/// Shared path filter. Ignore patterns always win over watch patterns.
struct CaptureFilter {
    root: PathBuf,
    ignore: GlobSet,
}

impl CaptureFilter {
    /// Root-relative form of `path`. Paths outside the root stay absolute,
    /// so directories above the root never take part in matching.
    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.is_match(self.relative(path))
    }

    fn matches(&self, matcher: &GlobMatcher, path: &Path) -> bool {
        matcher.is_match(self.relative(path))
    }
}

/// One watch pattern and the notify watcher serving it.
struct Subscription {
    pattern: String,
    matcher: GlobMatcher,
    _watcher: RecommendedWatcher,
}

/// Converts bursty filesystem notifications into debounced per-path groups.
///
/// Every accepted event re-arms a single debounce deadline (`sync_delay`).
/// Only when the deadline passes without new activity is the buffer grouped
/// by path and sent downstream. A path touched continuously faster than the
/// delay therefore never drains until activity pauses.
pub struct ChangeCapture {
    root: PathBuf,
    sync_delay: Duration,
    output: UnboundedSender<ChangeGroups>,
    filter: Option<Arc<CaptureFilter>>,
    subscriptions: Vec<Subscription>,
    event_tx: Option<UnboundedSender<RawChangeEvent>>,
    debounce_task: Option<JoinHandle<()>>,
}

impl ChangeCapture {
    pub fn new(root: impl Into<PathBuf>, sync_delay: Duration) -> (Self, UnboundedReceiver<ChangeGroups>) {
        let (output, receiver) = mpsc::unbounded_channel();
        let root = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        (
            Self {
                root,
                sync_delay,
                output,
                filter: None,
                subscriptions: Vec::new(),
                event_tx: None,
                debounce_task: None,
            },
            receiver,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.event_tx.is_some()
    }

    /// Patterns with an active subscription.
    pub fn active_patterns(&self) -> Vec<&str> {
        self.subscriptions
            .iter()
            .map(|s| s.pattern.as_str())
            .collect()
    }

    /// Begin listening. Must be called inside a tokio runtime.
    ///
    /// Each watch pattern gets its own subscription; a pattern that fails to
    /// compile or watch is logged and skipped. Returns the number of active
    /// subscriptions.
    pub fn start<S: AsRef<str>>(&mut self, patterns: &[S], ignore_patterns: &[S]) -> Result<usize> {
        if self.is_running() {
            return Err(DocSyncError::InvalidOperation(
                "change capture already started".to_string(),
            ));
        }

        let filter = Arc::new(CaptureFilter {
            root: self.root.clone(),
            ignore: pattern::build_ignore_set(ignore_patterns),
        });
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        for p in patterns {
            let p = p.as_ref();
            match self.subscribe(p, filter.clone(), event_tx.clone()) {
                Ok(subscription) => {
                    debug!("Subscribed to {:?}", p);
                    self.subscriptions.push(subscription);
                }
                Err(e) => error!("Failed to watch pattern {:?}: {}", p, e),
            }
        }

        self.debounce_task = Some(tokio::spawn(run_debounce(
            event_rx,
            self.output.clone(),
            self.sync_delay,
        )));
        self.filter = Some(filter);
        self.event_tx = Some(event_tx);

        info!(
            "Change capture started in {:?}: {} of {} patterns active",
            self.root,
            self.subscriptions.len(),
            patterns.len()
        );
        Ok(self.subscriptions.len())
    }

    fn subscribe(
        &self,
        glob: &str,
        filter: Arc<CaptureFilter>,
        event_tx: UnboundedSender<RawChangeEvent>,
    ) -> Result<Subscription> {
        let matcher = pattern::compile(glob)?;
        let (base, mode) = pattern::watch_target(&self.root, glob);

        let callback_matcher = matcher.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for (path, kind) in translate_event(&event) {
                        if filter.is_ignored(&path) || !filter.matches(&callback_matcher, &path) {
                            continue;
                        }
                        let _ = event_tx.send(RawChangeEvent::new(path, kind));
                    }
                }
                Err(e) => error!("File watcher error: {:?}", e),
            }
        })
        .map_err(|e| DocSyncError::Watch(e.to_string()))?;

        watcher
            .watch(&base, mode)
            .map_err(|e| DocSyncError::Watch(format!("{:?}: {}", base, e)))?;

        Ok(Subscription {
            pattern: glob.to_string(),
            matcher,
            _watcher: watcher,
        })
    }

    /// Feed an observed change through the same filters as watcher events.
    /// Returns whether the event was accepted into the debounce buffer.
    pub fn notify_change(&self, path: &Path, kind: ChangeKind) -> bool {
        let (Some(filter), Some(event_tx)) = (&self.filter, &self.event_tx) else {
            return false;
        };
        if filter.is_ignored(path) {
            return false;
        }
        if !self
            .subscriptions
            .iter()
            .any(|s| filter.matches(&s.matcher, path))
        {
            return false;
        }
        event_tx.send(RawChangeEvent::new(path, kind)).is_ok()
    }

    /// Dispose all subscriptions and discard anything still buffered.
    pub fn stop(&mut self) {
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        self.event_tx = None;
        self.filter = None;
        if let Some(task) = self.debounce_task.take() {
            task.abort();
        }
        if count > 0 {
            info!("Change capture stopped ({} subscriptions disposed)", count);
        }
    }
}

impl Drop for ChangeCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Buffer events and flush them grouped once `delay` passes without activity.
async fn run_debounce(
    mut events: UnboundedReceiver<RawChangeEvent>,
    output: UnboundedSender<ChangeGroups>,
    delay: Duration,
) {
    let mut buffer: Vec<RawChangeEvent> = Vec::new();
    let deadline = tokio::time::sleep(delay);
    tokio::pin!(deadline);
    let mut armed = false;

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Some(event) => {
                    buffer.push(event);
                    deadline.as_mut().reset(Instant::now() + delay);
                    armed = true;
                }
                None => break,
            },
            () = &mut deadline, if armed => {
                armed = false;
                let groups = ChangeGroups::from_events(buffer.drain(..));
                debug!("Debounce fired: {} paths", groups.len());
                if output.send(groups).is_err() {
                    warn!("Change consumer dropped, stopping debounce loop");
                    break;
                }
            }
        }
    }
}

/// Map a notify event onto (path, kind) pairs.
fn translate_event(event: &Event) -> Vec<(PathBuf, ChangeKind)> {
    match &event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| (p.clone(), ChangeKind::Create))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), ChangeKind::Delete))
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if event.paths.len() == 2 => vec![
                (event.paths[0].clone(), ChangeKind::Delete),
                (event.paths[1].clone(), ChangeKind::Create),
            ],
            RenameMode::From => event
                .paths
                .iter()
                .map(|p| (p.clone(), ChangeKind::Delete))
                .collect(),
            RenameMode::To => event
                .paths
                .iter()
                .filter(|p| !p.is_dir())
                .map(|p| (p.clone(), ChangeKind::Create))
                .collect(),
            _ => event
                .paths
                .iter()
                .filter(|p| !p.is_dir())
                .map(|p| {
                    let kind = if p.exists() {
                        ChangeKind::Create
                    } else {
                        ChangeKind::Delete
                    };
                    (p.clone(), kind)
                })
                .collect(),
        },
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| (p.clone(), ChangeKind::Change))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, p| event.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_translate_basic_kinds() {
        let created = translate_event(&event(
            EventKind::Create(CreateKind::File),
            &["/nowhere/a.md"],
        ));
        assert_eq!(created, vec![(PathBuf::from("/nowhere/a.md"), ChangeKind::Create)]);

        let modified = translate_event(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/nowhere/a.md"],
        ));
        assert_eq!(modified[0].1, ChangeKind::Change);

        let removed = translate_event(&event(
            EventKind::Remove(RemoveKind::File),
            &["/nowhere/a.md"],
        ));
        assert_eq!(removed[0].1, ChangeKind::Delete);
    }

    #[test]
    fn test_translate_rename_both() {
        let renamed = translate_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/nowhere/old.md", "/nowhere/new.md"],
        ));
        assert_eq!(
            renamed,
            vec![
                (PathBuf::from("/nowhere/old.md"), ChangeKind::Delete),
                (PathBuf::from("/nowhere/new.md"), ChangeKind::Create),
            ]
        );
    }

    #[test]
    fn test_access_events_are_dropped() {
        let accessed = translate_event(&event(
            EventKind::Access(notify::event::AccessKind::Any),
            &["/nowhere/a.md"],
        ));
        assert!(accessed.is_empty());
    }
}
