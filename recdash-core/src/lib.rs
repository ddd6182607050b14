//! recdash core library: config codec, domain types, settings, errors.
//!
//! - [`shell`] — lossless `config.sh` parse / update
//! - [`types`] — [`ConfigValues`], [`Snapshot`], [`SnapshotOptions`]
//! - [`store`] — read-before-write persistence of the config file
//! - [`recordings`] — export folder listing and safe file lookup
//! - [`settings`] — injected file locations
//! - [`companion`] — remote-control action ledger and telemetry logs

pub mod companion;
pub mod error;
pub mod recordings;
pub mod settings;
pub mod shell;
pub mod store;
pub mod types;

pub use companion::{ActionRecord, ActionRequest, CompanionStore, CompanionSummary, EventPayload};
pub use error::{CompanionError, ConfigError, RecordingError};
pub use recordings::{FileKind, Recording};
pub use settings::Settings;
pub use types::{ConfigValues, Snapshot, SnapshotMeta, SnapshotOptions, Violation, WatcherStatus};
