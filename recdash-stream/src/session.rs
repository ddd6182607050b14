//! Live snapshot sessions: filesystem watch → debounce → snapshot events.
//!
//! One [`Session`] per subscriber. A session owns its watch registrations,
//! one debounce timer, one heartbeat timer and the event sender. Closing is
//! idempotent and runs from every exit path, including `Drop`.
//!
//! ```text
//!   notify callback ──ChangeNotice──▶ session loop ──StreamEvent──▶ subscriber
//!                                       │   ▲
//!                          debounce 200ms   │ spawn_blocking(read_snapshot)
//!                                       ▼   │
//!                                   one read in flight
//! ```

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

use recdash_core::{Settings, Snapshot, SnapshotOptions};

use crate::error::StreamError;
use crate::reader::SnapshotSource;

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const EVENT_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTimings {
    pub debounce: Duration,
    pub heartbeat: Duration,
}

impl Default for StreamTimings {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE_WINDOW,
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One item on a subscriber's stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Snapshot(Snapshot),
    /// A snapshot read failed. The session keeps running.
    Error { message: String },
    /// Keep-alive with no payload; consumers ignore it.
    Heartbeat,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    message: &'a str,
}

impl StreamEvent {
    /// Wire event name; heartbeats are unnamed.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            StreamEvent::Snapshot(_) => Some("snapshot"),
            StreamEvent::Error { .. } => Some("stream-error"),
            StreamEvent::Heartbeat => None,
        }
    }

    /// JSON payload; heartbeats carry none.
    pub fn data(&self) -> Result<Option<String>, StreamError> {
        let data = match self {
            StreamEvent::Snapshot(snapshot) => Some(serde_json::to_string(snapshot)?),
            StreamEvent::Error { message } => {
                Some(serde_json::to_string(&ErrorPayload { message })?)
            }
            StreamEvent::Heartbeat => None,
        };
        Ok(data)
    }
}

// ---------------------------------------------------------------------------
// Change notification capability
// ---------------------------------------------------------------------------

/// A change reported for a watched directory. `file_name` is `None` when the
/// platform did not say which entry changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub file_name: Option<OsString>,
}

/// A live watch registration.
pub trait WatchHandle: Send {
    fn close(&mut self);
}

/// Registers directory watches that report into a notice channel.
pub trait ChangeWatcher: Send + Sync + 'static {
    fn watch_dir(
        &self,
        dir: &Path,
        notices: mpsc::UnboundedSender<ChangeNotice>,
    ) -> Result<Box<dyn WatchHandle>, StreamError>;
}

/// [`ChangeWatcher`] backed by the platform watcher from `notify`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyWatcher;

struct NotifyHandle {
    dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
}

impl WatchHandle for NotifyHandle {
    fn close(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(err) = watcher.unwatch(&self.dir) {
                tracing::debug!(path = %self.dir.display(), error = %err, "unwatch failed");
            }
        }
    }
}

impl ChangeWatcher for NotifyWatcher {
    fn watch_dir(
        &self,
        dir: &Path,
        notices: mpsc::UnboundedSender<ChangeNotice>,
    ) -> Result<Box<dyn WatchHandle>, StreamError> {
        let mut watcher = recommended_watcher(move |event: notify::Result<Event>| {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "watcher event error");
                    return;
                }
            };
            if !is_relevant_event_kind(&event.kind) {
                return;
            }
            if event.paths.is_empty() {
                let _ = notices.send(ChangeNotice { file_name: None });
            }
            for path in &event.paths {
                let _ = notices.send(ChangeNotice {
                    file_name: path.file_name().map(OsStr::to_os_string),
                });
            }
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %dir.display(), "watching directory");

        Ok(Box::new(NotifyHandle {
            dir: dir.to_path_buf(),
            watcher: Some(watcher),
        }))
    }
}

// Our own snapshot reads open the files; access events would loop forever.
fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Any
            | EventKind::Create(_)
            | EventKind::Modify(_)
            | EventKind::Remove(_)
            | EventKind::Other
    )
}

// ---------------------------------------------------------------------------
// Watch targets
// ---------------------------------------------------------------------------

/// The two files a session reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTargets {
    pub status_file: PathBuf,
    pub log_file: PathBuf,
}

impl WatchTargets {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            status_file: settings.status_file.clone(),
            log_file: settings.log_file.clone(),
        }
    }

    /// Parent directory of each file, one entry per file.
    pub fn directories(&self) -> Vec<PathBuf> {
        [&self.status_file, &self.log_file]
            .into_iter()
            .map(|file| match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            })
            .collect()
    }

    /// Unknown file names count as relevant; otherwise the name must match
    /// one of the monitored basenames.
    pub fn is_interesting(&self, file_name: Option<&OsStr>) -> bool {
        let Some(name) = file_name else {
            return true;
        };
        [&self.status_file, &self.log_file]
            .into_iter()
            .any(|file| file.file_name() == Some(name))
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// Factory for per-subscriber sessions. Cheap to clone.
#[derive(Clone)]
pub struct SnapshotStream {
    source: Arc<dyn SnapshotSource>,
    watcher: Arc<dyn ChangeWatcher>,
    targets: WatchTargets,
    timings: StreamTimings,
}

impl SnapshotStream {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        watcher: Arc<dyn ChangeWatcher>,
        targets: WatchTargets,
    ) -> Self {
        Self {
            source,
            watcher,
            targets,
            timings: StreamTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: StreamTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Start a session and return its event receiver.
    ///
    /// Dropping the receiver cancels the session, as does a message (or
    /// close) on `shutdown`. Must be called inside a Tokio runtime.
    pub fn subscribe(
        &self,
        options: SnapshotOptions,
        shutdown: broadcast::Receiver<()>,
    ) -> mpsc::Receiver<StreamEvent> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let mut watches = Vec::new();
        for dir in self.targets.directories() {
            match self.watcher.watch_dir(&dir, notice_tx.clone()) {
                Ok(handle) => watches.push(handle),
                Err(err) => {
                    tracing::debug!(
                        path = %dir.display(),
                        error = %err,
                        "skipping watch registration"
                    );
                }
            }
        }
        drop(notice_tx);

        let heartbeat = {
            let mut interval = tokio::time::interval_at(
                Instant::now() + self.timings.heartbeat,
                self.timings.heartbeat,
            );
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        };

        let session = Session {
            source: self.source.clone(),
            targets: self.targets.clone(),
            options,
            debounce_window: self.timings.debounce,
            events: Some(event_tx),
            watches,
            debounce: None,
            heartbeat: Some(heartbeat),
            in_flight: None,
            closed: false,
        };
        tokio::spawn(session.run(notice_rx, shutdown));
        event_rx
    }
}

type ReadResult = Result<Snapshot, StreamError>;

struct Session {
    source: Arc<dyn SnapshotSource>,
    targets: WatchTargets,
    options: SnapshotOptions,
    debounce_window: Duration,
    events: Option<mpsc::Sender<StreamEvent>>,
    watches: Vec<Box<dyn WatchHandle>>,
    debounce: Option<Pin<Box<Sleep>>>,
    heartbeat: Option<Interval>,
    in_flight: Option<JoinHandle<ReadResult>>,
    closed: bool,
}

impl Session {
    async fn run(
        mut self,
        mut notices: mpsc::UnboundedReceiver<ChangeNotice>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut notices_open = true;
        self.in_flight = Some(self.spawn_read());

        while !self.closed {
            tokio::select! {
                _ = sink_closed(&self.events) => {
                    tracing::debug!("subscriber disconnected");
                    break;
                }
                _ = shutdown.recv() => break,
                notice = notices.recv(), if notices_open => match notice {
                    Some(notice) => self.on_change(notice),
                    None => notices_open = false,
                },
                _ = fire(&mut self.debounce), if self.in_flight.is_none() => {
                    self.debounce = None;
                    self.in_flight = Some(self.spawn_read());
                }
                result = join(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.deliver(into_event(result)).await;
                }
                _ = tick(&mut self.heartbeat) => {
                    self.deliver(StreamEvent::Heartbeat).await;
                }
            }
        }

        self.close();
    }

    fn on_change(&mut self, notice: ChangeNotice) {
        if !self.targets.is_interesting(notice.file_name.as_deref()) {
            return;
        }
        if self.debounce.is_none() {
            self.debounce = Some(Box::pin(tokio::time::sleep(self.debounce_window)));
        }
    }

    fn spawn_read(&self) -> JoinHandle<ReadResult> {
        let source = self.source.clone();
        let options = self.options;
        tokio::task::spawn_blocking(move || source.read_snapshot(options))
    }

    async fn deliver(&mut self, event: StreamEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if events.send(event).await.is_err() {
            self.close();
        }
    }

    /// Release everything the session owns. Safe to call more than once.
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.debounce = None;
        self.heartbeat = None;
        if let Some(read) = self.in_flight.take() {
            read.abort();
        }
        for mut watch in self.watches.drain(..) {
            watch.close();
        }
        self.events = None;
        tracing::debug!("snapshot session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn into_event(result: Result<ReadResult, JoinError>) -> StreamEvent {
    match result {
        Ok(Ok(snapshot)) => StreamEvent::Snapshot(snapshot),
        Ok(Err(err)) => StreamEvent::Error {
            message: err.to_string(),
        },
        Err(err) => StreamEvent::Error {
            message: format!("Failed to read watcher snapshot: {err}"),
        },
    }
}

async fn sink_closed(events: &Option<mpsc::Sender<StreamEvent>>) {
    match events {
        Some(events) => events.closed().await,
        None => {}
    }
}

async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn join(read: &mut Option<JoinHandle<ReadResult>>) -> Result<ReadResult, JoinError> {
    match read {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
