//! `recdash serve` — run the HTTP dashboard API.

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;

use recdash_server::{init_tracing, AppState, DashboardServer, DEFAULT_BIND};

use super::PathArgs;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on. Keep it on loopback.
    #[arg(long, default_value = DEFAULT_BIND)]
    pub bind: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,

    /// Accept companion actions even when the remote-control feature flag
    /// is not set in the environment.
    #[arg(long)]
    pub remote_control: bool,

    #[command(flatten)]
    pub paths: PathArgs,
}

impl ServeArgs {
    pub fn run(self) -> Result<()> {
        init_tracing(self.json_logs);
        let settings = self.paths.settings()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;

        runtime.block_on(async move {
            let listener = TcpListener::bind(&self.bind)
                .await
                .with_context(|| format!("failed to bind {}", self.bind))?;
            println!(
                "recdash v{} listening on http://{}",
                env!("CARGO_PKG_VERSION"),
                listener.local_addr().context("listener has no address")?
            );

            let mut state = AppState::from_settings(settings);
            if self.remote_control {
                state = state.with_remote_control(true);
            }
            tracing::info!(remote_control = state.remote_control, "companion actions configured");

            DashboardServer::new(state)
                .run(listener)
                .await
                .context("dashboard server exited with error")
        })
    }
}
