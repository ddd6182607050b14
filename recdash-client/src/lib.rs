//! Consumer side of the snapshot stream: prefer push, degrade to polling.

pub mod driver;
mod error;
pub mod frame;
pub mod http;
pub mod machine;

pub use driver::{spawn, PullSource, PushStream, SyncHandle, SyncTimings, SyncView};
pub use error::ClientError;
pub use frame::{PushEvent, SseDecoder, SseFrame};
pub use http::{HttpPull, HttpPush};
pub use machine::{
    AfterFailure, ClientSync, SyncMode, FAILURE_THRESHOLD, FALLBACK_NOTICE, POLL_INTERVAL,
};
