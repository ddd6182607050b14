//! `recdash status` — one snapshot of the watcher, read straight from disk.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use recdash_core::{Snapshot, SnapshotOptions};
use recdash_stream::read_snapshot;

use super::{print_json, PathArgs};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Log lines to show (clamped to 10..=500).
    #[arg(long)]
    pub lines: Option<String>,

    /// Bytes of log to scan from the end (clamped to 8 KiB..=1 MiB).
    #[arg(long)]
    pub bytes: Option<String>,

    /// Print the raw snapshot as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub paths: PathArgs,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.paths.settings()?;
        let options = SnapshotOptions::from_query(self.lines.as_deref(), self.bytes.as_deref());
        let snapshot = read_snapshot(&settings.status_file, &settings.log_file, options);

        if self.json {
            return print_json(&snapshot);
        }
        print_snapshot(&snapshot);
        Ok(())
    }
}

pub fn print_snapshot(snapshot: &Snapshot) {
    println!("Watcher: {} ({})", state_label(snapshot.state()), snapshot.state());
    if let Some(meeting) = snapshot.status.get("meeting").filter(|m| !m.is_empty()) {
        println!("Meeting: {}", meeting.bold());
    }
    for (key, value) in snapshot
        .status
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "state" | "meeting"))
    {
        println!("  {}: {value}", key.bright_black());
    }

    if snapshot.logs.is_empty() {
        println!("{}", "No log output.".bright_black());
        return;
    }
    println!("{}", "■".repeat(60).bright_black());
    for line in &snapshot.logs {
        println!("{line}");
    }
}

/// Human label for a watcher state, colored the way the dashboard shows it.
pub fn state_label(state: &str) -> String {
    match state {
        "waiting_for_teams" => "Waiting for Teams".yellow().bold().to_string(),
        "idle" => "Monitoring Active".blue().bold().to_string(),
        "recording" => "Recording in Progress".red().bold().to_string(),
        _ => "Offline or Stopped".bright_black().bold().to_string(),
    }
}
