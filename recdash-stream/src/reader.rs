//! Snapshot reads of the watcher's status file and log tail.
//!
//! Both inputs are owned by the background watcher; this side only reads.
//! Missing files are normal (the watcher may never have run) and map to
//! defaults instead of errors.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use recdash_core::{Settings, Snapshot, SnapshotMeta, SnapshotOptions, WatcherStatus};

use crate::error::{io_err, StreamError};

/// Anything that can produce a [`Snapshot`] on demand.
///
/// Reads are blocking; the stream runs them on the blocking pool.
pub trait SnapshotSource: Send + Sync + 'static {
    fn read_snapshot(&self, options: SnapshotOptions) -> Result<Snapshot, StreamError>;
}

/// Reads snapshots from the status and log files on disk.
#[derive(Debug, Clone)]
pub struct FileSnapshotReader {
    pub status_file: PathBuf,
    pub log_file: PathBuf,
}

impl FileSnapshotReader {
    pub fn new(status_file: impl Into<PathBuf>, log_file: impl Into<PathBuf>) -> Self {
        Self {
            status_file: status_file.into(),
            log_file: log_file.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.status_file, &settings.log_file)
    }
}

impl SnapshotSource for FileSnapshotReader {
    fn read_snapshot(&self, options: SnapshotOptions) -> Result<Snapshot, StreamError> {
        Ok(read_snapshot(&self.status_file, &self.log_file, options))
    }
}

/// Compose a snapshot from the two files. The reads are independent: a
/// broken status file never hides the log tail and vice versa.
pub fn read_snapshot(status_file: &Path, log_file: &Path, options: SnapshotOptions) -> Snapshot {
    Snapshot {
        status: read_status(status_file),
        logs: read_log_tail(log_file, options.max_lines, options.max_bytes),
        meta: SnapshotMeta::from(options),
    }
}

// ---------------------------------------------------------------------------
// Status file
// ---------------------------------------------------------------------------

/// Parse the `key=value` status file. Always contains `state`.
pub fn read_status(path: &Path) -> WatcherStatus {
    match try_read_status(path) {
        Ok(status) => status,
        Err(err) => {
            tracing::debug!(error = %err, "status file unavailable");
            default_status()
        }
    }
}

/// [`read_status`] with the failure kept.
pub fn try_read_status(path: &Path) -> Result<WatcherStatus, StreamError> {
    let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(parse_status(&raw))
}

/// Lines split at the first `=` only; values such as meeting titles may
/// contain `=` themselves.
pub fn parse_status(raw: &str) -> WatcherStatus {
    let mut status = default_status();
    for line in raw.split('\n') {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        status.insert(key.to_string(), value.trim().to_string());
    }
    status
}

fn default_status() -> WatcherStatus {
    WatcherStatus::from([("state".to_string(), "unknown".to_string())])
}

// ---------------------------------------------------------------------------
// Log tail
// ---------------------------------------------------------------------------

/// A file that can report its size and serve one positioned read.
pub trait TailRead {
    fn size(&self) -> io::Result<u64>;
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

impl TailRead for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

/// Last `max_lines` non-empty lines of `path`, reading at most `max_bytes`.
/// A missing or unreadable log yields no lines.
pub fn read_log_tail(path: &Path, max_lines: usize, max_bytes: u64) -> Vec<String> {
    match try_read_log_tail(path, max_lines, max_bytes) {
        Ok(lines) => lines,
        Err(err) => {
            tracing::debug!(error = %err, "log tail unavailable");
            Vec::new()
        }
    }
}

/// [`read_log_tail`] with the failure kept.
pub fn try_read_log_tail(
    path: &Path,
    max_lines: usize,
    max_bytes: u64,
) -> Result<Vec<String>, StreamError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    tail_lines(&file, max_lines, max_bytes).map_err(|e| io_err(path, e))
}

/// Read the tail of `source` in a single positioned read of
/// `min(size, max_bytes)` bytes.
///
/// When the read starts past byte 0 the first (partial) line is dropped.
pub fn tail_lines<R: TailRead>(
    source: &R,
    max_lines: usize,
    max_bytes: u64,
) -> io::Result<Vec<String>> {
    let size = source.size()?;
    if size == 0 {
        return Ok(Vec::new());
    }

    let to_read = size.min(max_bytes);
    let start = size - to_read;
    let mut buf = vec![0u8; to_read as usize];
    let read = source.read_at(&mut buf, start)?;
    buf.truncate(read);

    let mut chunk: &[u8] = &buf;
    if start > 0 {
        if let Some(newline) = chunk.iter().position(|b| *b == b'\n') {
            chunk = &chunk[newline + 1..];
        }
    }

    let text = String::from_utf8_lossy(chunk);
    let lines: Vec<&str> = text.split('\n').filter(|line| !line.is_empty()).collect();
    let skip = lines.len().saturating_sub(max_lines);
    Ok(lines[skip..].iter().map(|line| line.to_string()).collect())
}
