//! `recdash config` — inspect and edit the watcher's config.sh.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use recdash_core::types::{
    EXPORT_FOLDER_KEY, KEYWORDS_KEY, POLL_ACTIVE_KEY, POLL_INACTIVE_KEY, STABILITY_KEY,
};
use recdash_core::{shell, store, ConfigError, ConfigValues, Violation};

use super::{print_json, PathArgs};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the current values.
    Show(ShowArgs),
    /// Change one or more values, keeping the rest of the file intact.
    Set(SetArgs),
    /// Check the file's values against their allowed ranges.
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Print the values as JSON.
    #[arg(long)]
    pub json: bool,

    /// Print the file verbatim instead.
    #[arg(long, conflicts_with = "json")]
    pub raw: bool,

    #[command(flatten)]
    pub paths: PathArgs,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Window-title keyword; repeat for several. Replaces the whole list.
    #[arg(long = "keyword", value_name = "TEXT")]
    pub keywords: Vec<String>,

    /// Seconds between checks while a meeting is active (1..=60).
    #[arg(long)]
    pub poll_active: Option<i64>,

    /// Seconds between checks while idle (10..=300).
    #[arg(long)]
    pub poll_inactive: Option<i64>,

    /// Seconds a window must stay put before recording starts (1..=20).
    #[arg(long)]
    pub stability_delay: Option<i64>,

    /// Where finished recordings are exported. Empty restores the default.
    #[arg(long)]
    pub export_folder: Option<String>,

    #[command(flatten)]
    pub paths: PathArgs,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub paths: PathArgs,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show(args) => show(args),
        ConfigCommand::Set(args) => set(args),
        ConfigCommand::Validate(args) => validate(args),
    }
}

fn show(args: ShowArgs) -> Result<()> {
    let settings = args.paths.settings()?;
    let content = store::read_text(&settings.config_file)
        .with_context(|| format!("failed to read {}", settings.config_file.display()))?;

    if args.raw {
        print!("{content}");
        return Ok(());
    }
    let values = shell::parse(&content);
    if args.json {
        return print_json(&values);
    }

    println!("{}", settings.config_file.display().to_string().bold());
    let mut table = Table::new(rows(&values));
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn set(args: SetArgs) -> Result<()> {
    let settings = args.paths.settings()?;
    let path = &settings.config_file;
    let mut values = store::load_values(path);

    let mut changed = false;
    if !args.keywords.is_empty() {
        values.window_keywords = args.keywords;
        changed = true;
    }
    if let Some(value) = args.poll_active {
        values.poll_interval_active = value;
        changed = true;
    }
    if let Some(value) = args.poll_inactive {
        values.poll_interval_inactive = value;
        changed = true;
    }
    if let Some(value) = args.stability_delay {
        values.stability_check_delay = value;
        changed = true;
    }
    if let Some(value) = args.export_folder {
        values.export_folder = value;
        changed = true;
    }
    if !changed {
        bail!("nothing to change; pass at least one value flag");
    }

    match store::save_values(path, &values) {
        Ok(_) => {
            println!("Saved {}", path.display());
            Ok(())
        }
        Err(ConfigError::Invalid(violations)) => {
            print_violations(&violations);
            bail!("config not saved: {} invalid value(s)", violations.len())
        }
        Err(err) => Err(err).with_context(|| format!("failed to save {}", path.display())),
    }
}

fn validate(args: ValidateArgs) -> Result<()> {
    let settings = args.paths.settings()?;
    let path = &settings.config_file;
    let content = store::read_text(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    match shell::parse(&content).validate() {
        Ok(()) => {
            println!("{} {}", "✓".green().bold(), path.display());
            Ok(())
        }
        Err(violations) => {
            print_violations(&violations);
            bail!("{} invalid value(s) in {}", violations.len(), path.display())
        }
    }
}

fn print_violations(violations: &[Violation]) {
    for violation in violations {
        eprintln!("{} {violation}", "✗".red().bold());
    }
}

#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "key")]
    key: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn rows(values: &ConfigValues) -> Vec<ValueRow> {
    let export_folder = if values.export_folder.is_empty() {
        "(default)".to_string()
    } else {
        values.export_folder.clone()
    };
    vec![
        ValueRow {
            key: KEYWORDS_KEY,
            value: values.window_keywords.join(", "),
        },
        ValueRow {
            key: POLL_ACTIVE_KEY,
            value: values.poll_interval_active.to_string(),
        },
        ValueRow {
            key: POLL_INACTIVE_KEY,
            value: values.poll_interval_inactive.to_string(),
        },
        ValueRow {
            key: STABILITY_KEY,
            value: values.stability_check_delay.to_string(),
        },
        ValueRow {
            key: EXPORT_FOLDER_KEY,
            value: export_folder,
        },
    ]
}
