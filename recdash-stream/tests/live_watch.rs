//! End-to-end: real files, the platform watcher and a live session.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use recdash_core::{Settings, SnapshotOptions};
use recdash_stream::{FileSnapshotReader, NotifyWatcher, SnapshotStream, StreamEvent, WatchTargets};

const WAIT: Duration = Duration::from_secs(10);

async fn next_state(events: &mut mpsc::Receiver<StreamEvent>) -> Option<String> {
    loop {
        match events.recv().await? {
            StreamEvent::Snapshot(snapshot) => return Some(snapshot.state().to_string()),
            StreamEvent::Heartbeat => continue,
            StreamEvent::Error { message } => panic!("stream error: {message}"),
        }
    }
}

fn stream_for(settings: &Settings) -> SnapshotStream {
    SnapshotStream::new(
        Arc::new(FileSnapshotReader::from_settings(settings)),
        Arc::new(NotifyWatcher),
        WatchTargets::from_settings(settings),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn status_file_change_reaches_subscriber() {
    let home = TempDir::new().expect("home");
    let settings = Settings::from_home(home.path());
    fs::create_dir_all(settings.log_file.parent().expect("log dir")).expect("create log dir");
    fs::write(&settings.status_file, "state=idle\n").expect("write status");

    let (_shutdown, shutdown_rx) = broadcast::channel(1);
    let mut events = stream_for(&settings).subscribe(SnapshotOptions::default(), shutdown_rx);

    let first = timeout(WAIT, next_state(&mut events)).await.expect("initial snapshot");
    assert_eq!(first.as_deref(), Some("idle"));

    fs::write(&settings.status_file, "state=recording\nmeeting=Weekly\n").expect("rewrite status");

    let updated = timeout(WAIT, async {
        loop {
            match next_state(&mut events).await {
                Some(state) if state == "recording" => return state,
                Some(_) => continue,
                None => panic!("stream ended early"),
            }
        }
    })
    .await
    .expect("refresh after change");
    assert_eq!(updated, "recording");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_directories_still_yield_an_initial_snapshot() {
    let home = TempDir::new().expect("home");
    let settings = Settings::from_home(&home.path().join("never-created"));

    let (_shutdown, shutdown_rx) = broadcast::channel(1);
    let mut events = stream_for(&settings).subscribe(SnapshotOptions::default(), shutdown_rx);

    let first = timeout(WAIT, next_state(&mut events)).await.expect("initial snapshot");
    assert_eq!(first.as_deref(), Some("unknown"));
}
