//! File locations the dashboard works against.
//!
//! Everything that used to be derived from the process environment lives in
//! [`Settings`], so libraries and tests pass paths explicitly.
//!
//! # Default layout
//!
//! ```text
//! ~/.teams_watcher_status                        status file (key=value)
//! ~/Library/Logs/TeamsVoiceMemos.log             watcher log
//! ~/teams_recorder/engine/config.sh              watcher config
//! ~/teams_recorder/recordings/                   fallback export folder
//! ~/teams_recorder/.companion/state.json          companion action ledger
//! ~/teams_recorder/.telemetry/                    events.ndjson, actions.ndjson
//! ~/Library/LaunchAgents/com.teams-voice-record.plist
//! ```

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const WATCHER_LABEL: &str = "com.teams-voice-record";
pub const STATUS_FILE_NAME: &str = ".teams_watcher_status";
pub const LOG_FILE_NAME: &str = "TeamsVoiceMemos.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub status_file: PathBuf,
    pub log_file: PathBuf,
    pub config_file: PathBuf,
    pub default_export_folder: PathBuf,
    pub launch_agent_plist: PathBuf,
    pub companion_state_file: PathBuf,
    pub telemetry_dir: PathBuf,
}

impl Settings {
    /// Default layout rooted at `home`. Pure, no I/O.
    pub fn from_home(home: &Path) -> Self {
        let project_root = home.join("teams_recorder");
        Self {
            status_file: home.join(STATUS_FILE_NAME),
            log_file: home.join("Library").join("Logs").join(LOG_FILE_NAME),
            config_file: project_root.join("engine").join("config.sh"),
            default_export_folder: project_root.join("recordings"),
            launch_agent_plist: home
                .join("Library")
                .join("LaunchAgents")
                .join(format!("{WATCHER_LABEL}.plist")),
            companion_state_file: project_root.join(".companion").join("state.json"),
            telemetry_dir: project_root.join(".telemetry"),
        }
    }

    /// `from_home` convenience wrapper using `dirs::home_dir()`.
    pub fn discover() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(Self::from_home(&home))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_hangs_off_home() {
        let settings = Settings::from_home(Path::new("/Users/tester"));
        assert_eq!(
            settings.status_file,
            PathBuf::from("/Users/tester/.teams_watcher_status")
        );
        assert_eq!(
            settings.log_file,
            PathBuf::from("/Users/tester/Library/Logs/TeamsVoiceMemos.log")
        );
        assert_eq!(
            settings.launch_agent_plist,
            PathBuf::from("/Users/tester/Library/LaunchAgents/com.teams-voice-record.plist")
        );
        assert_eq!(
            settings.companion_state_file,
            PathBuf::from("/Users/tester/teams_recorder/.companion/state.json")
        );
        assert_eq!(
            settings.telemetry_dir,
            PathBuf::from("/Users/tester/teams_recorder/.telemetry")
        );
    }
}
