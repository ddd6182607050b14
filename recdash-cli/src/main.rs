//! recdash — dashboard for the background meeting-recording watcher.
//!
//! # Usage
//!
//! ```text
//! recdash serve [--bind 127.0.0.1:3000] [--json-logs]
//! recdash status [--lines <n>] [--bytes <n>] [--json]
//! recdash watch [--url http://127.0.0.1:3000] [--poll-only]
//! recdash config show|set|validate
//! recdash service start|stop|restart
//! recdash recordings [--json]
//! ```
//!
//! Every command accepts `--home` and per-file overrides
//! (`--status-file`, `--log-file`, `--config-file`, `--plist`).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand, recordings::RecordingsArgs, serve::ServeArgs, service::ServiceArgs,
    status::StatusArgs, watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "recdash",
    version,
    about = "Monitor and control the background recording watcher",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the local HTTP dashboard API.
    Serve(ServeArgs),

    /// Print the watcher status and recent log lines.
    Status(StatusArgs),

    /// Follow a running dashboard, live when possible, polling otherwise.
    Watch(WatchArgs),

    /// Read, edit or check the watcher config.sh.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Start, stop or restart the watcher launch agent.
    Service(ServiceArgs),

    /// List recordings in the export folder.
    Recordings(RecordingsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Watch(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
        Commands::Service(args) => args.run(),
        Commands::Recordings(args) => args.run(),
    }
}
