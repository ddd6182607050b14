//! The two-state streaming/polling machine.
//!
//! Pure bookkeeping: no I/O and no timers. The driver feeds it what happened
//! on the wire and acts on the answer.

use std::fmt;
use std::time::Duration;

/// Consecutive transport failures tolerated before falling back to polling.
pub const FAILURE_THRESHOLD: u32 = 3;

pub const POLL_INTERVAL: Duration = Duration::from_millis(3000);

pub const FALLBACK_NOTICE: &str = "Live updates unavailable; falling back to polling";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Streaming,
    Polling,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Streaming => f.write_str("streaming"),
            SyncMode::Polling => f.write_str("polling"),
        }
    }
}

/// What the driver should do after a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterFailure {
    /// Below the threshold: open a new stream.
    Reconnect,
    /// Threshold reached: close the stream and start polling.
    FallBack,
    /// Already polling; nothing changes.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSync {
    mode: SyncMode,
    reconnect_failures: u32,
}

impl ClientSync {
    pub fn new(push_available: bool) -> Self {
        Self {
            mode: if push_available {
                SyncMode::Streaming
            } else {
                SyncMode::Polling
            },
            reconnect_failures: 0,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn reconnect_failures(&self) -> u32 {
        self.reconnect_failures
    }

    /// A snapshot arrived over the stream.
    pub fn record_snapshot(&mut self) {
        if self.mode == SyncMode::Streaming {
            self.reconnect_failures = 0;
        }
    }

    pub fn record_transport_error(&mut self) -> AfterFailure {
        if self.mode == SyncMode::Polling {
            return AfterFailure::Ignored;
        }
        self.reconnect_failures += 1;
        if self.reconnect_failures >= FAILURE_THRESHOLD {
            self.fall_back();
            AfterFailure::FallBack
        } else {
            AfterFailure::Reconnect
        }
    }

    /// Switch to polling unconditionally. Polling is terminal.
    pub fn fall_back(&mut self) {
        self.mode = SyncMode::Polling;
        self.reconnect_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_mode_follows_push_capability() {
        assert_eq!(ClientSync::new(true).mode(), SyncMode::Streaming);
        assert_eq!(ClientSync::new(false).mode(), SyncMode::Polling);
    }

    #[test]
    fn third_consecutive_failure_falls_back() {
        let mut sync = ClientSync::new(true);
        assert_eq!(sync.record_transport_error(), AfterFailure::Reconnect);
        assert_eq!(sync.record_transport_error(), AfterFailure::Reconnect);
        assert_eq!(sync.reconnect_failures(), 2);
        assert_eq!(sync.record_transport_error(), AfterFailure::FallBack);
        assert_eq!(sync.mode(), SyncMode::Polling);
    }

    #[test]
    fn snapshot_resets_the_counter() {
        let mut sync = ClientSync::new(true);
        sync.record_transport_error();
        sync.record_transport_error();
        sync.record_snapshot();
        assert_eq!(sync.reconnect_failures(), 0);
        assert_eq!(sync.record_transport_error(), AfterFailure::Reconnect);
        assert_eq!(sync.mode(), SyncMode::Streaming);
    }

    #[test]
    fn failures_while_polling_change_nothing() {
        let mut sync = ClientSync::new(false);
        for _ in 0..5 {
            assert_eq!(sync.record_transport_error(), AfterFailure::Ignored);
        }
        assert_eq!(sync.mode(), SyncMode::Polling);
        assert_eq!(sync.reconnect_failures(), 0);
    }
}
