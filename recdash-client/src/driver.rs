//! Async driver that runs [`ClientSync`] against real capabilities.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use recdash_core::Snapshot;

use crate::error::ClientError;
use crate::frame::PushEvent;
use crate::machine::{AfterFailure, ClientSync, SyncMode, FALLBACK_NOTICE, POLL_INTERVAL};

/// Opens push streams. `None` means no push capability.
pub trait PushStream: Send + Sync + 'static {
    fn connect(&self) -> Option<mpsc::Receiver<PushEvent>>;
}

/// Request/response snapshot fetch. Blocking; run off the async threads.
pub trait PullSource: Send + Sync + 'static {
    fn pull(&self) -> Result<Snapshot, ClientError>;
}

/// Where state and user-visible messages go.
pub trait SyncView: Send + 'static {
    fn apply(&mut self, snapshot: Snapshot);
    fn notice(&mut self, message: &str);
    fn error(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimings {
    pub poll_interval: Duration,
    /// Pause before reopening a failed stream.
    pub reconnect_delay: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Running sync loop. Stopping is idempotent; dropping the handle stops it.
pub struct SyncHandle {
    shutdown: Option<broadcast::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the loop to finish (after [`SyncHandle::stop`] or on its own).
    pub async fn stopped(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "sync task ended abnormally");
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start syncing. Must be called inside a Tokio runtime.
pub fn spawn<V: SyncView>(
    push: Option<Arc<dyn PushStream>>,
    pull: Arc<dyn PullSource>,
    view: V,
    timings: SyncTimings,
) -> SyncHandle {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(run(push, pull, view, timings, shutdown_rx));
    SyncHandle {
        shutdown: Some(shutdown_tx),
        task: Some(task),
    }
}

enum Exit {
    Shutdown,
    Poll,
}

async fn run<V: SyncView>(
    push: Option<Arc<dyn PushStream>>,
    pull: Arc<dyn PullSource>,
    mut view: V,
    timings: SyncTimings,
    mut shutdown: broadcast::Receiver<()>,
) {
    let stream = push.as_ref().and_then(|push| push.connect());
    let mut machine = ClientSync::new(stream.is_some());
    tracing::debug!(mode = %machine.mode(), "sync starting");

    if let (Some(push), Some(stream)) = (push, stream) {
        let exit = stream_phase(
            &*push,
            stream,
            &mut machine,
            &mut view,
            timings,
            &mut shutdown,
        )
        .await;
        if let Exit::Shutdown = exit {
            return;
        }
    }

    poll_phase(pull, &mut view, timings, &mut shutdown).await;
}

async fn stream_phase<V: SyncView>(
    push: &dyn PushStream,
    mut stream: mpsc::Receiver<PushEvent>,
    machine: &mut ClientSync,
    view: &mut V,
    timings: SyncTimings,
    shutdown: &mut broadcast::Receiver<()>,
) -> Exit {
    loop {
        let event = tokio::select! {
            _ = shutdown.recv() => return Exit::Shutdown,
            event = stream.recv() => {
                event.unwrap_or_else(|| PushEvent::TransportError("stream closed".to_string()))
            }
        };

        match event {
            PushEvent::Snapshot(snapshot) => {
                machine.record_snapshot();
                view.apply(snapshot);
            }
            PushEvent::ServerError(message) => view.error(&message),
            PushEvent::TransportError(message) => {
                tracing::debug!(
                    error = %message,
                    failures = machine.reconnect_failures() + 1,
                    "stream transport error"
                );
                drop(stream);
                match machine.record_transport_error() {
                    AfterFailure::Reconnect => {}
                    AfterFailure::FallBack | AfterFailure::Ignored => {
                        view.notice(FALLBACK_NOTICE);
                        return Exit::Poll;
                    }
                }

                tokio::select! {
                    _ = shutdown.recv() => return Exit::Shutdown,
                    _ = tokio::time::sleep(timings.reconnect_delay) => {}
                }
                match push.connect() {
                    Some(next) => stream = next,
                    None => {
                        machine.fall_back();
                        view.notice(FALLBACK_NOTICE);
                        return Exit::Poll;
                    }
                }
            }
        }

        if machine.mode() == SyncMode::Polling {
            return Exit::Poll;
        }
    }
}

async fn poll_phase<V: SyncView>(
    pull: Arc<dyn PullSource>,
    view: &mut V,
    timings: SyncTimings,
    shutdown: &mut broadcast::Receiver<()>,
) {
    // First tick completes immediately.
    let mut ticker = tokio::time::interval(timings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = ticker.tick() => {}
        }

        let source = pull.clone();
        let result = tokio::select! {
            _ = shutdown.recv() => return,
            result = tokio::task::spawn_blocking(move || source.pull()) => result,
        };
        match result {
            Ok(Ok(snapshot)) => view.apply(snapshot),
            Ok(Err(err)) => view.error(&err.to_string()),
            Err(err) => view.error(&ClientError::Task(err.to_string()).to_string()),
        }
    }
}
