use std::path::PathBuf;

use thiserror::Error;

/// Error surface for snapshot reads and watch registration.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("snapshot read failed: {0}")]
    Read(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StreamError {
    StreamError::Io {
        path: path.into(),
        source,
    }
}
