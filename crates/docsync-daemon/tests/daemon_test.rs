use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docsync_core::{
    ChangeKind, ClassifiedChange, DocSyncConfig, DocSyncError, Priority, Result, SyncTransport,
};
use docsync_daemon::{DaemonState, HttpTransport, LogTransport, SyncDaemon, SyncSession};
use mockito::{Matcher, Server};
use parking_lot::Mutex;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingTransport {
    batches: Mutex<Vec<Vec<ClassifiedChange>>>,
}

#[async_trait]
impl SyncTransport for RecordingTransport {
    async fn sync_changes(&self, changes: &[ClassifiedChange]) -> Result<()> {
        self.batches.lock().push(changes.to_vec());
        Ok(())
    }
}

impl RecordingTransport {
    fn delivered_names(&self) -> Vec<String> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .filter_map(|c| c.path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }
}

fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

fn fast_config(root: &Path) -> DocSyncConfig {
    let mut config = DocSyncConfig::default();
    config.sync.root = Some(root.to_path_buf());
    config.sync.sync_delay_ms = 100;
    config.sync.drain_delay_ms = 10;
    config
}

fn doc_change(path: &str) -> ClassifiedChange {
    ClassifiedChange {
        path: PathBuf::from(path),
        kind: ChangeKind::Change,
        content: Some("# Title".to_string()),
        language: None,
        has_documentation: true,
        priority: Priority::High,
    }
}

#[tokio::test]
async fn http_transport_posts_batch_as_json() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/sync")
        .match_header("content-type", "application/json")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""path":"docs/a.md""#.to_string()),
            Matcher::Regex(r#""priority":"high""#.to_string()),
            Matcher::Regex(r#""sent_at":""#.to_string()),
        ]))
        .with_status(200)
        .create_async()
        .await;

    let transport = HttpTransport::new(format!("{}/sync", server.url()));
    transport
        .sync_changes(&[doc_change("docs/a.md")])
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn http_transport_rejects_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/sync")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let transport = HttpTransport::new(format!("{}/sync", server.url()));
    let err = transport
        .sync_changes(&[doc_change("docs/a.md")])
        .await
        .unwrap_err();
    match err {
        DocSyncError::Transport(message) => {
            assert!(message.contains("503"));
            assert!(message.contains("maintenance"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn log_transport_accepts_everything() {
    assert!(LogTransport
        .sync_changes(&[doc_change("docs/a.md")])
        .await
        .is_ok());
}

#[tokio::test]
async fn session_classifies_and_queues_injected_changes() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "README.md", "# Project\n");
    write(dir.path(), "test/foo.test.ts", "expect(1).toBe(1);\n");

    let transport = Arc::new(RecordingTransport::default());
    let mut session = SyncSession::new(&fast_config(dir.path()), transport.clone()).unwrap();
    assert_eq!(session.active_patterns().len(), 3);

    let root = session.root().to_path_buf();
    assert!(session
        .capture()
        .notify_change(&root.join("README.md"), ChangeKind::Change));
    assert!(session
        .capture()
        .notify_change(&root.join("test/foo.test.ts"), ChangeKind::Change));
    assert!(!session
        .capture()
        .notify_change(&root.join("node_modules/x/README.md"), ChangeKind::Change));

    let groups = tokio::time::timeout(Duration::from_secs(5), session.next_batch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(groups.len(), 2);

    assert_eq!(session.process_batch(groups).await, 1);
    let metrics = session.metrics();
    assert_eq!(metrics.batches_captured, 1);
    assert_eq!(metrics.paths_seen, 2);
    assert_eq!(metrics.changes_classified, 1);
    assert_eq!(metrics.changes_suppressed, 1);
    assert_eq!(metrics.read_errors, 0);

    assert!(session.queue().force_sync().await);
    assert_eq!(transport.delivered_names(), vec!["README.md"]);
    session.stop();
}

#[tokio::test]
async fn rapid_edits_reach_the_queue_as_one_item_with_latest_content() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let mut config = fast_config(dir.path());
    config.sync.sync_delay_ms = 300;
    let mut session = SyncSession::new(&config, transport.clone()).unwrap();

    let guide = session.root().join("docs/guide.md");
    for version in 1..=5 {
        write(session.root(), "docs/guide.md", &format!("# Guide v{}\n", version));
        assert!(session.capture().notify_change(&guide, ChangeKind::Change));
    }

    let groups = tokio::time::timeout(Duration::from_secs(5), session.next_batch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups.groups[0].path, guide);
    assert!(groups.groups[0].events.len() >= 5);

    assert_eq!(session.process_batch(groups).await, 1);
    let items = session.queue().queue();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].change.content.as_deref(), Some("# Guide v5\n"));

    assert!(session.queue().force_sync().await);
    let batches = transport.batches.lock().clone();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].content.as_deref(), Some("# Guide v5\n"));
    session.stop();
}

#[tokio::test]
async fn paused_queue_rejects_classified_changes() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "README.md", "# Project\n");

    let transport = Arc::new(RecordingTransport::default());
    let mut session = SyncSession::new(&fast_config(dir.path()), transport).unwrap();
    session.queue().pause();

    let readme = session.root().join("README.md");
    assert!(session.capture().notify_change(&readme, ChangeKind::Change));
    let groups = session.next_batch().await.unwrap();

    assert_eq!(session.process_batch(groups).await, 0);
    assert_eq!(session.metrics().changes_rejected, 1);
    assert_eq!(session.queue().status().queue_length, 0);
}

#[tokio::test]
async fn session_requires_existing_root() {
    let dir = TempDir::new().unwrap();
    let config = fast_config(&dir.path().join("nope"));
    assert!(SyncSession::new(&config, Arc::new(LogTransport)).is_err());
}

#[tokio::test]
async fn daemon_delivers_file_edits_end_to_end() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let mut daemon = SyncDaemon::new(fast_config(dir.path()), transport.clone());

    std::fs::create_dir(dir.path().join("docs")).unwrap();
    let docs = dir.path().to_path_buf();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        write(&docs, "docs/guide.md", "# Guide\n\nHow to use it.\n");
    });

    let observer = transport.clone();
    daemon
        .run_until(async move {
            for _ in 0..200 {
                if !observer.delivered_names().is_empty() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .unwrap();

    assert_eq!(transport.delivered_names(), vec!["guide.md"]);
    let status = daemon.status().await;
    assert_eq!(status.state, DaemonState::Stopped);
    assert!(status.metrics.batches_captured >= 1);
    assert_eq!(status.queue.history_count, 1);
}
