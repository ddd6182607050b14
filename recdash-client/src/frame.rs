//! Line-level decoding of a `text/event-stream` body.

use recdash_core::Snapshot;
use serde::Deserialize;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Accumulates `event:` / `data:` fields until a blank line.
///
/// Comment lines (leading `:`) are dropped, which is how heartbeats vanish.
/// A frame without any `data:` line is not dispatched.
#[derive(Debug, Default)]
pub struct SseDecoder {
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

/// What the push side reports to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Snapshot(Snapshot),
    /// The server sent a `stream-error` event. The connection is fine.
    ServerError(String),
    /// The connection failed or ended.
    TransportError(String),
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

impl PushEvent {
    /// Map a decoded frame; unknown event names are skipped.
    pub fn from_frame(frame: SseFrame) -> Option<Self> {
        match frame.event.as_deref() {
            Some("snapshot") => Some(match serde_json::from_str::<Snapshot>(&frame.data) {
                Ok(snapshot) => PushEvent::Snapshot(snapshot),
                Err(err) => PushEvent::ServerError(format!("malformed snapshot payload: {err}")),
            }),
            Some("stream-error") => {
                let message = serde_json::from_str::<ErrorPayload>(&frame.data)
                    .map(|payload| payload.message)
                    .unwrap_or(frame.data);
                Some(PushEvent::ServerError(message))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode(body: &str) -> Vec<SseFrame> {
        let mut decoder = SseDecoder::default();
        body.split('\n').filter_map(|line| decoder.push_line(line)).collect()
    }

    #[test]
    fn heartbeat_comments_produce_no_frames() {
        assert!(decode(": heartbeat\n\n: heartbeat\n\n").is_empty());
    }

    #[test]
    fn named_event_with_multiline_data() {
        let frames = decode("event: snapshot\ndata: {\"a\":\ndata: 1}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("snapshot".to_string()),
                data: "{\"a\":\n1}".to_string(),
            }]
        );
    }

    #[rstest]
    #[case::crlf_without_space("event:stream-error\r\ndata:{\"message\":\"x\"}\r\n\r\n")]
    #[case::one_space_stripped("event: stream-error\ndata: {\"message\":\"x\"}\n\n")]
    #[case::comment_between_fields("event: stream-error\n: ping\ndata: {\"message\":\"x\"}\n\n")]
    fn field_spellings_decode_alike(#[case] body: &str) {
        let frames = decode(body);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("stream-error"));
        assert_eq!(frames[0].data, "{\"message\":\"x\"}");
    }

    #[test]
    fn event_name_does_not_leak_into_next_frame() {
        let frames = decode("event: snapshot\n\ndata: plain\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
    }

    #[test]
    fn stream_error_frame_maps_to_server_error() {
        let frame = SseFrame {
            event: Some("stream-error".to_string()),
            data: r#"{"message":"disk gone"}"#.to_string(),
        };
        assert_eq!(
            PushEvent::from_frame(frame),
            Some(PushEvent::ServerError("disk gone".to_string()))
        );
    }

    #[test]
    fn snapshot_frame_decodes_payload() {
        let frame = SseFrame {
            event: Some("snapshot".to_string()),
            data: r#"{"status":{"state":"idle"},"logs":["up"],"meta":{"lines":50,"bytes":65536}}"#
                .to_string(),
        };
        match PushEvent::from_frame(frame) {
            Some(PushEvent::Snapshot(snapshot)) => {
                assert_eq!(snapshot.state(), "idle");
                assert_eq!(snapshot.logs, vec!["up"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
