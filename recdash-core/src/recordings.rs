//! The export folder: finished recordings and their markdown companions.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordingError;

const AUDIO_EXT: &str = "m4a";
const MARKDOWN_EXT: &str = "md";

/// One `.m4a` file in the export folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub name: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    /// `<base>_summary.md` or `<base>.md` exists next to it.
    pub has_summary: bool,
    /// `<base>_transcript.md` exists next to it.
    pub has_transcript: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Audio,
    Markdown,
}

impl FileKind {
    pub fn content_type(self) -> &'static str {
        match self {
            FileKind::Audio => "audio/mp4",
            FileKind::Markdown => "text/markdown; charset=utf-8",
        }
    }
}

fn lower_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Recordings in `folder`, newest first.
pub fn list(folder: &Path) -> Result<Vec<Recording>, RecordingError> {
    let entries = std::fs::read_dir(folder).map_err(|e| io_err(folder, e))?;

    let mut markdown = Vec::new();
    let mut recordings = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(folder, e))?;
        let file_type = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();

        match lower_extension(&name).as_deref() {
            Some(MARKDOWN_EXT) => markdown.push(name),
            Some(AUDIO_EXT) => {
                let metadata = entry.metadata().map_err(|e| io_err(entry.path(), e))?;
                let modified = metadata.modified().map_err(|e| io_err(entry.path(), e))?;
                recordings.push(Recording {
                    name,
                    size: metadata.len(),
                    modified_at: DateTime::<Utc>::from(modified),
                    has_summary: false,
                    has_transcript: false,
                });
            }
            _ => {}
        }
    }

    for recording in &mut recordings {
        let base = recording
            .name
            .strip_suffix(".m4a")
            .unwrap_or(&recording.name);
        let has = |candidate: String| markdown.iter().any(|name| *name == candidate);
        recording.has_summary = has(format!("{base}_summary.md")) || has(format!("{base}.md"));
        recording.has_transcript = has(format!("{base}_transcript.md"));
    }

    recordings.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
    Ok(recordings)
}

/// Resolve a client-supplied file name inside `folder`.
///
/// Names with path separators or `..` are rejected before any filesystem
/// access, as are extensions other than `.m4a` and `.md`.
pub fn resolve(folder: &Path, name: &str) -> Result<(PathBuf, FileKind), RecordingError> {
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(RecordingError::InvalidName);
    }
    let kind = match lower_extension(name).as_deref() {
        Some(AUDIO_EXT) => FileKind::Audio,
        Some(MARKDOWN_EXT) => FileKind::Markdown,
        _ => return Err(RecordingError::UnsupportedType),
    };

    let path = folder.join(name);
    if !path.is_file() {
        return Err(RecordingError::NotFound(path));
    }
    Ok((path, kind))
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RecordingError {
    RecordingError::Io {
        path: path.into(),
        source,
    }
}
