use std::time::Duration;

use docsync_core::ChangeKind;
use docsync_watch::ChangeCapture;
use tempfile::TempDir;

const NO_IGNORES: &[&str] = &[];

#[tokio::test(start_paused = true)]
async fn burst_on_one_path_collapses_into_one_group() {
    let dir = TempDir::new().unwrap();
    let (mut capture, mut rx) = ChangeCapture::new(dir.path(), Duration::from_secs(5));
    assert_eq!(capture.start(&["**/*.md"], NO_IGNORES).unwrap(), 1);

    let guide = capture.root().join("guide.md");
    for _ in 0..5 {
        assert!(capture.notify_change(&guide, ChangeKind::Change));
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    // Last event at t=4s, so nothing may drain before t=9s.
    assert!(tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .is_err());

    let groups = rx.recv().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups.groups[0].path, guide);
    assert_eq!(groups.groups[0].events.len(), 5);

    assert!(tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .is_err());
}

#[tokio::test(start_paused = true)]
async fn groups_keep_first_arrival_order() {
    let dir = TempDir::new().unwrap();
    let (mut capture, mut rx) = ChangeCapture::new(dir.path(), Duration::from_millis(500));
    capture.start(&["**/*.md", "src/**/*.ts"], NO_IGNORES).unwrap();

    let a = capture.root().join("docs/a.md");
    let b = capture.root().join("src/api/b.ts");
    assert!(capture.notify_change(&a, ChangeKind::Create));
    assert!(capture.notify_change(&b, ChangeKind::Change));
    assert!(capture.notify_change(&a, ChangeKind::Delete));

    let groups = rx.recv().await.unwrap();
    let paths: Vec<_> = groups.paths().map(|p| p.to_path_buf()).collect();
    assert_eq!(paths, vec![a, b]);
    assert_eq!(
        groups.groups[0].last().map(|e| e.kind),
        Some(ChangeKind::Delete)
    );
}

#[tokio::test]
async fn ignore_patterns_take_precedence() {
    let dir = TempDir::new().unwrap();
    let (mut capture, _rx) = ChangeCapture::new(dir.path(), Duration::from_secs(5));
    capture
        .start(&["**/*.md"], &["**/node_modules/**", "**/target/**"])
        .unwrap();

    let root = capture.root().to_path_buf();
    assert!(!capture.notify_change(&root.join("node_modules/pkg/README.md"), ChangeKind::Change));
    assert!(!capture.notify_change(&root.join("target/doc/index.md"), ChangeKind::Create));
    assert!(!capture.notify_change(&root.join("src/main.rs"), ChangeKind::Change));
    assert!(capture.notify_change(&root.join("README.md"), ChangeKind::Change));
}

#[tokio::test]
async fn root_below_ignored_directory_name_still_captures() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("build").join("myproject");
    std::fs::create_dir_all(&root).unwrap();

    let (mut capture, _rx) = ChangeCapture::new(&root, Duration::from_secs(5));
    capture
        .start(
            &["**/*.md", "src/**/*.ts"],
            &["**/node_modules/**", "**/build/**", "**/target/**", "**/dist/**"],
        )
        .unwrap();

    let root = capture.root().to_path_buf();
    assert!(capture.notify_change(&root.join("README.md"), ChangeKind::Change));
    assert!(capture.notify_change(&root.join("src/api/b.ts"), ChangeKind::Change));
    assert!(!capture.notify_change(&root.join("build/out.md"), ChangeKind::Create));
}

#[tokio::test]
async fn malformed_pattern_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    let (mut capture, _rx) = ChangeCapture::new(dir.path(), Duration::from_secs(5));

    assert_eq!(capture.start(&["[", "**/*.md"], NO_IGNORES).unwrap(), 1);
    assert_eq!(capture.active_patterns(), vec!["**/*.md"]);
    assert!(capture.notify_change(&capture.root().join("notes.md"), ChangeKind::Create));
}

#[tokio::test]
async fn starting_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (mut capture, _rx) = ChangeCapture::new(dir.path(), Duration::from_secs(5));
    capture.start(&["**/*.md"], NO_IGNORES).unwrap();
    assert!(capture.start(&["**/*.md"], NO_IGNORES).is_err());
}

#[tokio::test(start_paused = true)]
async fn stop_discards_buffered_events() {
    let dir = TempDir::new().unwrap();
    let (mut capture, mut rx) = ChangeCapture::new(dir.path(), Duration::from_secs(5));
    capture.start(&["**/*.md"], NO_IGNORES).unwrap();

    let notes = capture.root().join("notes.md");
    assert!(capture.notify_change(&notes, ChangeKind::Change));
    tokio::time::sleep(Duration::from_secs(1)).await;
    capture.stop();

    assert!(!capture.is_running());
    assert!(!capture.notify_change(&notes, ChangeKind::Change));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn real_file_write_is_captured() {
    let dir = TempDir::new().unwrap();
    let (mut capture, mut rx) = ChangeCapture::new(dir.path(), Duration::from_millis(200));
    assert_eq!(capture.start(&["**/*.md"], NO_IGNORES).unwrap(), 1);

    let live = capture.root().join("live.md");
    std::fs::write(&live, "# Live\n").unwrap();
    std::fs::write(capture.root().join("ignored.rs"), "fn main() {}\n").unwrap();

    let groups = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("no change captured")
        .unwrap();
    let paths: Vec<_> = groups.paths().map(|p| p.to_path_buf()).collect();
    assert_eq!(paths, vec![live]);
}
