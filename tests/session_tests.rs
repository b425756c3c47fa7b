mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use driveway::clock::{ManualClock, SystemClock};
use driveway::error::PipelineError;
use driveway::events::SubscriberId;
use driveway::session::UploadOrchestrator;

use common::RecordingNotifier;

fn orchestrator(notifier: &Arc<RecordingNotifier>) -> UploadOrchestrator {
    UploadOrchestrator::new(notifier.clone(), Arc::new(SystemClock))
}

fn source(parts: &[&'static str]) -> stream::Iter<std::vec::IntoIter<Result<Bytes, String>>> {
    stream::iter(
        parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect::<Vec<_>>(),
    )
}

#[tokio::test]
async fn test_single_file_upload() {
    let temp_dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = orchestrator(&notifier).begin_session(
        SubscriberId::new("10"),
        temp_dir.path(),
        Duration::from_secs(1),
    );

    session.on_file_part("photo", source(&["hello ", "world"]), "demo.txt");
    let result = session.on_request_end().await;

    assert!(result.is_success());
    assert_eq!(result.succeeded.len(), 1);
    assert_eq!(result.bytes_stored(), 11);
    assert_eq!(result.session_id, session.id());

    let content = std::fs::read_to_string(temp_dir.path().join("demo.txt")).unwrap();
    assert_eq!(content, "hello world");

    let sent = notifier.sent();
    assert_eq!(sent[0].0, SubscriberId::new("10"));
    assert_eq!(sent[0].2.processed_already, 6);
}

#[tokio::test]
async fn test_empty_file_is_stored() {
    let temp_dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = orchestrator(&notifier).begin_session(
        SubscriberId::new("10"),
        temp_dir.path(),
        Duration::from_secs(1),
    );

    session.on_file_part("doc", source(&[]), "empty.txt");
    let result = session.on_request_end().await;

    assert!(result.is_success());
    assert_eq!(result.succeeded[0].bytes, 0);
    assert!(temp_dir.path().join("empty.txt").exists());
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_sink_failure_does_not_stop_siblings() {
    let temp_dir = tempfile::tempdir().unwrap();
    // a directory where the file should go makes the sink fail to open
    std::fs::create_dir(temp_dir.path().join("clash.bin")).unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = orchestrator(&notifier).begin_session(
        SubscriberId::new("10"),
        temp_dir.path(),
        Duration::from_secs(1),
    );

    session.on_file_part("a", source(&["first ", "file"]), "ok.txt");
    session.on_file_part("b", source(&["doomed"]), "clash.bin");
    session.on_file_part("c", source(&["third"]), "also-ok.txt");
    let result = session.on_request_end().await;

    assert!(!result.is_success());
    assert_eq!(result.total(), 3);
    assert_eq!(result.succeeded.len(), 2);
    assert_eq!(result.failed.len(), 1);

    let failed = &result.failed[0];
    assert_eq!(failed.filename, "clash.bin");
    assert_eq!(failed.error.as_ref().map(|e| e.kind()), Some("io"));

    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("ok.txt")).unwrap(),
        "first file"
    );
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("also-ok.txt")).unwrap(),
        "third"
    );
}

#[tokio::test]
async fn test_escaping_filename_is_rejected_before_open() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("store");
    std::fs::create_dir(&root).unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = orchestrator(&notifier).begin_session(
        SubscriberId::new("10"),
        &root,
        Duration::from_secs(1),
    );

    session.on_file_part("evil", source(&["pwned"]), "../evil.txt");
    assert_eq!(session.in_flight(), 0);

    let result = session.on_request_end().await;
    assert_eq!(result.failed.len(), 1);
    assert!(matches!(result.failed[0].error, Some(PipelineError::Path(_))));
    assert!(!temp_dir.path().join("evil.txt").exists());
    assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_concurrent_parts_keep_their_own_progress() {
    let temp_dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = ManualClock::new();
    let orchestrator = UploadOrchestrator::new(notifier.clone(), Arc::new(clock.clone()));
    let mut session = orchestrator.begin_session(
        SubscriberId::new("10"),
        temp_dir.path(),
        Duration::from_secs(1),
    );

    let (tx_a, rx_a) = mpsc::channel::<Result<Bytes, String>>(1);
    let (tx_b, rx_b) = mpsc::channel::<Result<Bytes, String>>(1);
    session.on_file_part("a", ReceiverStream::new(rx_a), "a.bin");
    session.on_file_part("b", ReceiverStream::new(rx_b), "b.bin");
    assert_eq!(session.in_flight(), 2);

    tx_a.send(Ok(Bytes::from_static(b"aaa"))).await.unwrap();
    tx_b.send(Ok(Bytes::from_static(b"bbbbbbb"))).await.unwrap();
    tx_a.send(Ok(Bytes::from_static(b"aa"))).await.unwrap();
    clock.advance(Duration::from_secs(1));
    tx_b.send(Ok(Bytes::from_static(b"b"))).await.unwrap();
    drop(tx_a);
    drop(tx_b);

    let result = session.on_request_end().await;
    assert!(result.is_success());
    assert_eq!(result.bytes_stored(), 13);

    // each file's first chunk notifies on its own, regardless of the other
    assert_eq!(notifier.events_for("a.bin").first(), Some(&3));
    assert_eq!(notifier.events_for("b.bin").first(), Some(&7));
    assert_eq!(std::fs::read(temp_dir.path().join("a.bin")).unwrap(), b"aaaaa");
    assert_eq!(std::fs::read(temp_dir.path().join("b.bin")).unwrap(), b"bbbbbbbb");
}

#[tokio::test]
async fn test_abort_cancels_in_flight_pipelines() {
    let temp_dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = orchestrator(&notifier).begin_session(
        SubscriberId::new("10"),
        temp_dir.path(),
        Duration::from_secs(1),
    );

    let (tx, rx) = mpsc::channel::<Result<Bytes, String>>(1);
    session.on_file_part("video", ReceiverStream::new(rx), "partial.mov");
    session.on_file_part("notes", source(&["done"]), "notes.txt");
    tx.send(Ok(Bytes::from_static(b"12345"))).await.unwrap();

    session.abort();
    let result = session.on_request_end().await;

    let partial = result
        .failed
        .iter()
        .find(|o| o.filename == "partial.mov")
        .expect("stalled part is reported as failed");
    assert_eq!(partial.error, Some(PipelineError::Cancelled));
    assert!(partial.bytes <= 5);
    assert!(!result.is_success());
    // no rollback: whatever was opened stays on disk
    assert!(temp_dir.path().join("partial.mov").exists());
    drop(tx);
}

#[tokio::test]
async fn test_dropping_a_session_cancels_its_work() {
    let temp_dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = orchestrator(&notifier).begin_session(
        SubscriberId::new("10"),
        temp_dir.path(),
        Duration::from_secs(1),
    );

    let (tx, rx) = mpsc::channel::<Result<Bytes, String>>(1);
    session.on_file_part("video", ReceiverStream::new(rx), "gone.mov");
    let token = session.cancel_token();

    // wait until the pipeline is streaming into an open sink
    tx.send(Ok(Bytes::from_static(b"partial"))).await.unwrap();
    let target = temp_dir.path().join("gone.mov");
    tokio::time::timeout(Duration::from_secs(1), async {
        while !target.exists() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    drop(session);
    assert!(token.is_cancelled());

    // the task let go of its source, so it has ended and its sink is closed
    tokio::time::timeout(Duration::from_secs(1), tx.closed())
        .await
        .unwrap();
    assert!(tx.send(Ok(Bytes::from_static(b"late"))).await.is_err());
    assert!(target.exists());
}
