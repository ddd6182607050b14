//! Watcher snapshots: one-shot reads and live, debounced change streams.

mod error;
pub mod reader;
pub mod session;

pub use error::StreamError;
pub use reader::{read_snapshot, FileSnapshotReader, SnapshotSource};
pub use session::{
    ChangeNotice, ChangeWatcher, NotifyWatcher, SnapshotStream, StreamEvent, StreamTimings,
    WatchHandle, WatchTargets, DEBOUNCE_WINDOW, HEARTBEAT_INTERVAL,
};
