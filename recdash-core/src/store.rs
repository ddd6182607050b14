//! Persistence for `config.sh`.
//!
//! The file is the single source of truth: every read and every write goes
//! back to disk, nothing is cached between calls.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, ConfigError};
use crate::settings::Settings;
use crate::shell;
use crate::types::ConfigValues;

/// Raw config text. A missing file reads as empty.
pub fn read_text(path: &Path) -> Result<String, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Parsed values. Missing or unreadable files yield the defaults.
pub fn load_values(path: &Path) -> ConfigValues {
    match std::fs::read_to_string(path) {
        Ok(text) => shell::parse(&text),
        Err(_) => ConfigValues::default(),
    }
}

/// Validate `values`, splice them into the current file and write it back.
///
/// Out-of-domain values are rejected before the file is touched. Returns the
/// text that was written.
pub fn save_values(path: &Path, values: &ConfigValues) -> Result<String, ConfigError> {
    values.validate().map_err(ConfigError::Invalid)?;
    let current = read_text(path)?;
    let updated = shell::update(&current, values);
    write_atomic(path, &updated)?;
    Ok(updated)
}

/// Replace the file with `text` as-is (the raw editor path).
pub fn save_text(path: &Path, text: &str) -> Result<(), ConfigError> {
    write_atomic(path, text)
}

/// Where recordings live: the configured `EXPORT_FOLDER` when it is not
/// blank, otherwise the default folder from `settings`.
pub fn resolve_export_folder(settings: &Settings) -> PathBuf {
    let values = load_values(&settings.config_file);
    let configured = values.export_folder.trim();
    if configured.is_empty() {
        settings.default_export_folder.clone()
    } else {
        PathBuf::from(configured)
    }
}

/// Write flow: `.tmp` sibling → `rename`, so readers never see a torn file.
fn write_atomic(path: &Path, text: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config.sh".to_string());
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    std::fs::write(&tmp_path, text).map_err(|e| io_err(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}
