//! `recdash recordings` — what the watcher has exported so far.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use recdash_core::{recordings, store, Recording};

use super::{print_json, PathArgs};

#[derive(Args, Debug)]
pub struct RecordingsArgs {
    /// Print the listing as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub paths: PathArgs,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordingListJson<'a> {
    export_folder: String,
    recordings: &'a [Recording],
}

#[derive(Tabled)]
struct RecordingRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "size")]
    size: String,
    #[tabled(rename = "modified")]
    modified: String,
    #[tabled(rename = "summary")]
    summary: &'static str,
    #[tabled(rename = "transcript")]
    transcript: &'static str,
}

impl RecordingsArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.paths.settings()?;
        let folder = store::resolve_export_folder(&settings);
        let items = recordings::list(&folder)
            .with_context(|| format!("failed to list recordings in {}", folder.display()))?;

        if self.json {
            return print_json(&RecordingListJson {
                export_folder: folder.display().to_string(),
                recordings: &items,
            });
        }
        print_table(&folder, items);
        Ok(())
    }
}

fn print_table(folder: &Path, items: Vec<Recording>) {
    println!("{} | {} recordings", folder.display().to_string().bold(), items.len());
    if items.is_empty() {
        println!("No recordings yet.");
        return;
    }

    let rows: Vec<RecordingRow> = items
        .into_iter()
        .map(|item| RecordingRow {
            name: item.name,
            size: human_size(item.size),
            modified: item
                .modified_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            summary: yes_no(item.has_summary),
            transcript: yes_no(item.has_transcript),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "-"
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
