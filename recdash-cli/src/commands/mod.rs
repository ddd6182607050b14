pub mod config;
pub mod recordings;
pub mod serve;
pub mod service;
pub mod status;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use recdash_core::Settings;

/// File locations shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// Root the default layout here instead of the user's home directory.
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Watcher status file.
    #[arg(long, value_name = "FILE")]
    pub status_file: Option<PathBuf>,

    /// Watcher log file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Watcher config.sh.
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Launch agent plist.
    #[arg(long, value_name = "FILE")]
    pub plist: Option<PathBuf>,
}

impl PathArgs {
    pub fn settings(&self) -> Result<Settings> {
        let home = match &self.home {
            Some(home) => home.clone(),
            None => dirs::home_dir().context("could not determine home directory")?,
        };

        let mut settings = Settings::from_home(&home);
        if let Some(path) = &self.status_file {
            settings.status_file = path.clone();
        }
        if let Some(path) = &self.log_file {
            settings.log_file = path.clone();
        }
        if let Some(path) = &self.config_file {
            settings.config_file = path.clone();
        }
        if let Some(path) = &self.plist {
            settings.launch_agent_plist = path.clone();
        }
        Ok(settings)
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}
