//! Error types for recdash-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Violation;

/// Errors from reading or persisting the watcher configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure on the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Structured values fell outside their declared domains. Nothing was written.
    #[error("invalid config values: {}", format_violations(.0))]
    Invalid(Vec<Violation>),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

/// Errors from listing or resolving files in the export folder.
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("Invalid recording name")]
    InvalidName,

    #[error("Unsupported file type")]
    UnsupportedType,

    #[error("Recording not found")]
    NotFound(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the companion ledger and telemetry logs.
#[derive(Debug, Error)]
pub enum CompanionError {
    /// A well-formed action body broke a field rule.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("invalid_event_schema")]
    InvalidEvent,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
