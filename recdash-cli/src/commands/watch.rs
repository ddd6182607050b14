//! `recdash watch` — follow a running dashboard server.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use colored::Colorize;
use tokio::sync::mpsc;

use recdash_client::{HttpPull, HttpPush, PushStream, SyncTimings, SyncView};
use recdash_core::{Snapshot, SnapshotOptions};

use super::status::state_label;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Base URL of the dashboard server.
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    pub url: String,

    /// Skip the live stream and poll from the start.
    #[arg(long)]
    pub poll_only: bool,

    /// Exit after this many snapshots.
    #[arg(long)]
    pub count: Option<usize>,

    /// Log lines requested per snapshot.
    #[arg(long)]
    pub lines: Option<String>,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let options = SnapshotOptions::from_query(self.lines.as_deref(), None);
        let push: Option<Arc<dyn PushStream>> = if self.poll_only {
            None
        } else {
            Some(Arc::new(HttpPush::new(&self.url, options)))
        };
        let pull = Arc::new(HttpPull::new(&self.url, options));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;

        runtime.block_on(async move {
            let (done_tx, mut done_rx) = mpsc::unbounded_channel();
            let view = PrintView::new(self.count, done_tx);
            let mut handle = recdash_client::spawn(push, pull, view, SyncTimings::default());

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = done_rx.recv() => {}
            }
            handle.stop();
            handle.stopped().await;
            Ok(())
        })
    }
}

/// Prints each snapshot as a one-line summary followed by log lines not
/// seen in the previous one.
struct PrintView {
    remaining: Option<usize>,
    done: mpsc::UnboundedSender<()>,
    last_logs: Vec<String>,
}

impl PrintView {
    fn new(count: Option<usize>, done: mpsc::UnboundedSender<()>) -> Self {
        Self {
            remaining: count,
            done,
            last_logs: Vec::new(),
        }
    }
}

impl SyncView for PrintView {
    fn apply(&mut self, snapshot: Snapshot) {
        println!(
            "[{}] {}",
            Local::now().format("%H:%M:%S"),
            state_label(snapshot.state())
        );
        for line in fresh_lines(&self.last_logs, &snapshot.logs) {
            println!("  {line}");
        }
        self.last_logs = snapshot.logs;

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                let _ = self.done.send(());
            }
        }
    }

    fn notice(&mut self, message: &str) {
        eprintln!("{}", message.yellow());
    }

    fn error(&mut self, message: &str) {
        eprintln!("{} {message}", "error:".red().bold());
    }
}

/// Lines of `current` that follow the longest suffix of `previous` it
/// starts with. Everything is fresh when the two do not overlap.
fn fresh_lines<'a>(previous: &[String], current: &'a [String]) -> &'a [String] {
    let max_overlap = previous.len().min(current.len());
    for overlap in (1..=max_overlap).rev() {
        if previous[previous.len() - overlap..] == current[..overlap] {
            return &current[overlap..];
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_new_tail_lines_are_fresh() {
        let previous = lines(&["a", "b", "c"]);
        let current = lines(&["b", "c", "d", "e"]);
        assert_eq!(fresh_lines(&previous, &current), &lines(&["d", "e"])[..]);
    }

    #[test]
    fn identical_tails_have_nothing_fresh() {
        let logs = lines(&["a", "b"]);
        assert!(fresh_lines(&logs, &logs).is_empty());
    }

    #[test]
    fn disjoint_tails_are_all_fresh() {
        let current = lines(&["x", "y"]);
        assert_eq!(fresh_lines(&lines(&["a"]), &current), &current[..]);
        assert_eq!(fresh_lines(&[], &current), &current[..]);
    }

    #[test]
    fn count_signals_done_after_last_snapshot() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut view = PrintView::new(Some(2), tx);
        let snapshot = Snapshot {
            status: [("state".to_string(), "idle".to_string())].into_iter().collect(),
            logs: Vec::new(),
            meta: SnapshotOptions::default().into(),
        };

        view.apply(snapshot.clone());
        assert!(rx.try_recv().is_err());
        view.apply(snapshot);
        assert!(rx.try_recv().is_ok());
    }
}
