//! `ureq`-backed capabilities talking to a running dashboard server.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use tokio::sync::mpsc;

use recdash_core::{Snapshot, SnapshotOptions};

use crate::driver::{PullSource, PushStream};
use crate::error::{request_err, ClientError};
use crate::frame::{PushEvent, SseDecoder};

const PULL_TIMEOUT: Duration = Duration::from_secs(10);
// Three missed heartbeats means the connection is dead.
const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(45);
const PUSH_BUFFER: usize = 16;

fn query(options: SnapshotOptions) -> String {
    format!("lines={}&bytes={}", options.max_lines, options.max_bytes)
}

fn endpoint(base_url: &str, path: &str, options: SnapshotOptions) -> String {
    format!("{}{path}?{}", base_url.trim_end_matches('/'), query(options))
}

/// `GET /api/status` once per call.
#[derive(Debug, Clone)]
pub struct HttpPull {
    agent: ureq::Agent,
    url: String,
}

impl HttpPull {
    pub fn new(base_url: &str, options: SnapshotOptions) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(PULL_TIMEOUT).build(),
            url: endpoint(base_url, "/api/status", options),
        }
    }
}

impl PullSource for HttpPull {
    fn pull(&self) -> Result<Snapshot, ClientError> {
        let response = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|e| request_err(&self.url, e))?;
        Ok(response.into_json::<Snapshot>()?)
    }
}

/// `GET /api/status/stream`, read on a dedicated thread.
///
/// The thread forwards decoded events until the body ends, the read fails
/// or the receiver is dropped; the first two end with a transport error.
#[derive(Debug, Clone)]
pub struct HttpPush {
    agent: ureq::Agent,
    url: String,
}

impl HttpPush {
    pub fn new(base_url: &str, options: SnapshotOptions) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(PULL_TIMEOUT)
                .timeout_read(STREAM_READ_TIMEOUT)
                .build(),
            url: endpoint(base_url, "/api/status/stream", options),
        }
    }
}

impl PushStream for HttpPush {
    fn connect(&self) -> Option<mpsc::Receiver<PushEvent>> {
        let (tx, rx) = mpsc::channel(PUSH_BUFFER);
        let agent = self.agent.clone();
        let url = self.url.clone();

        let spawned = std::thread::Builder::new()
            .name("recdash-push".to_string())
            .spawn(move || pump(&agent, &url, &tx));
        match spawned {
            Ok(_) => Some(rx),
            Err(err) => {
                tracing::warn!(error = %err, "could not start stream reader");
                None
            }
        }
    }
}

fn pump(agent: &ureq::Agent, url: &str, tx: &mpsc::Sender<PushEvent>) {
    let message = match read_stream(agent, url, tx) {
        Ok(Delivery::ReceiverGone) => return,
        Ok(Delivery::Ended) => "stream ended".to_string(),
        Err(err) => err.to_string(),
    };
    let _ = tx.blocking_send(PushEvent::TransportError(message));
}

enum Delivery {
    Ended,
    ReceiverGone,
}

fn read_stream(
    agent: &ureq::Agent,
    url: &str,
    tx: &mpsc::Sender<PushEvent>,
) -> Result<Delivery, ClientError> {
    let response = agent
        .get(url)
        .set("accept", "text/event-stream")
        .call()
        .map_err(|e| request_err(url, e))?;
    tracing::debug!(url, "stream connected");

    forward_events(BufReader::new(response.into_reader()), tx)
}

/// Decode lines into events until the body ends.
///
/// The receiver is checked after every line, heartbeat comments included, so
/// a stopped consumer releases the connection within one heartbeat interval
/// instead of waiting for the next snapshot or the read timeout.
fn forward_events<R: BufRead>(
    reader: R,
    tx: &mpsc::Sender<PushEvent>,
) -> Result<Delivery, ClientError> {
    let mut decoder = SseDecoder::default();
    for line in reader.lines() {
        let line = line?;
        if tx.is_closed() {
            return Ok(Delivery::ReceiverGone);
        }
        let Some(event) = decoder.push_line(&line).and_then(PushEvent::from_frame) else {
            continue;
        };
        if tx.blocking_send(event).is_err() {
            return Ok(Delivery::ReceiverGone);
        }
    }
    Ok(Delivery::Ended)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_carry_snapshot_bounds() {
        let options = SnapshotOptions {
            max_lines: 200,
            max_bytes: 8192,
        };
        assert_eq!(
            endpoint("http://127.0.0.1:3000/", "/api/status", options),
            "http://127.0.0.1:3000/api/status?lines=200&bytes=8192"
        );
    }

    #[test]
    fn unreachable_server_is_a_request_error() {
        // Port 9 (discard) is closed on loopback in test environments.
        let pull = HttpPull::new("http://127.0.0.1:9", SnapshotOptions::default());
        match pull.pull() {
            Err(ClientError::Request { url, .. }) => {
                assert!(url.ends_with("/api/status?lines=50&bytes=65536"))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn stopped_consumer_is_noticed_on_a_heartbeat() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let body = ": heartbeat\n\n: heartbeat\n\nevent: snapshot\n";
        let mut cursor = std::io::Cursor::new(body.as_bytes());

        let delivery = forward_events(&mut cursor, &tx).expect("forward");

        assert!(matches!(delivery, Delivery::ReceiverGone));
        assert_eq!(cursor.position(), ": heartbeat\n".len() as u64);
    }

    #[test]
    fn frames_are_forwarded_until_the_body_ends() {
        let (tx, mut rx) = mpsc::channel(4);
        let body = ": heartbeat\n\nevent: stream-error\ndata: {\"message\":\"disk\"}\n\n";

        let delivery = forward_events(body.as_bytes(), &tx).expect("forward");

        assert!(matches!(delivery, Delivery::Ended));
        assert_eq!(rx.try_recv().ok(), Some(PushEvent::ServerError("disk".to_string())));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_connection_reports_a_transport_error() {
        let push = HttpPush::new("http://127.0.0.1:9", SnapshotOptions::default());
        let mut rx = push.connect().expect("push capability");
        match rx.recv().await {
            Some(PushEvent::TransportError(message)) => assert!(!message.is_empty()),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
