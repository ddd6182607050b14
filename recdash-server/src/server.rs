//! HTTP server setup: state, router, serve loop and logging.
//!
//! # Responsibilities
//! - Build the Axum router with every dashboard route
//! - Gate file-serving and state-changing routes behind the loopback guard
//!   (companion actions included; telemetry ingest and companion reads stay open)
//! - Serve with graceful shutdown that also ends live snapshot sessions

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use recdash_core::companion::{self, CompanionStore};
use recdash_core::Settings;
use recdash_stream::{
    ChangeWatcher, FileSnapshotReader, NotifyWatcher, SnapshotSource, SnapshotStream, WatchTargets,
};

use crate::control::{Launchctl, SystemLaunchctl};
use crate::guard::require_local_request;
use crate::handlers;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub snapshots: Arc<dyn SnapshotSource>,
    pub stream: SnapshotStream,
    pub launchctl: Arc<dyn Launchctl>,
    pub companion: Arc<CompanionStore>,
    /// Companion actions are refused unless the remote-control flag is on.
    pub remote_control: bool,
    pub shutdown: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        snapshots: Arc<dyn SnapshotSource>,
        watcher: Arc<dyn ChangeWatcher>,
        launchctl: Arc<dyn Launchctl>,
    ) -> Self {
        let stream = SnapshotStream::new(
            snapshots.clone(),
            watcher,
            WatchTargets::from_settings(&settings),
        );
        let (shutdown, _) = broadcast::channel(4);
        Self {
            companion: Arc::new(CompanionStore::from_settings(&settings)),
            settings: Arc::new(settings),
            snapshots,
            stream,
            launchctl,
            remote_control: false,
            shutdown,
        }
    }

    pub fn with_remote_control(mut self, enabled: bool) -> Self {
        self.remote_control = enabled;
        self
    }

    /// Production wiring: files on disk, platform watcher, real `launchctl`,
    /// remote control as the environment's feature flags say.
    pub fn from_settings(settings: Settings) -> Self {
        let snapshots = Arc::new(FileSnapshotReader::from_settings(&settings));
        Self::new(settings, snapshots, Arc::new(NotifyWatcher), Arc::new(SystemLaunchctl))
            .with_remote_control(companion::remote_control_enabled())
    }
}

/// HTTP server for the dashboard.
pub struct DashboardServer {
    router: Router,
    shutdown: broadcast::Sender<()>,
}

impl DashboardServer {
    pub fn new(state: AppState) -> Self {
        let shutdown = state.shutdown.clone();
        Self {
            router: Self::build_router(state),
            shutdown,
        }
    }

    pub fn build_router(state: AppState) -> Router {
        let local_only = middleware::from_fn(require_local_request);

        Router::new()
            .route("/api/health", get(handlers::health))
            .route("/api/status", get(handlers::status))
            .route("/api/status/stream", get(handlers::status_stream))
            .route(
                "/api/config",
                get(handlers::read_config)
                    .merge(post(handlers::save_config).route_layer(local_only.clone())),
            )
            .route(
                "/api/recordings",
                get(handlers::list_recordings).route_layer(local_only.clone()),
            )
            .route(
                "/api/recordings/{name}",
                get(handlers::fetch_recording).route_layer(local_only.clone()),
            )
            .route(
                "/api/control",
                post(handlers::control).route_layer(local_only.clone()),
            )
            .route(
                "/api/companion/action",
                post(handlers::companion_action).route_layer(local_only),
            )
            .route("/api/companion/summary", get(handlers::companion_summary))
            .route(
                "/api/companion/status/{execution_id}",
                get(handlers::companion_status),
            )
            .route("/api/product-core/events", post(handlers::ingest_event))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Sender that stops the server (and every live stream) when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "dashboard server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(self.shutdown))
            .await?;

        tracing::info!("dashboard server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C or an explicit message, then tells every live
/// session to close so graceful shutdown does not wait on open streams.
async fn shutdown_signal(shutdown: broadcast::Sender<()>) {
    let mut requested = shutdown.subscribe();
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = requested.recv() => {}
    }
    tracing::info!("shutdown signal received");
    let _ = shutdown.send(());
}

/// Install the global subscriber once. `RUST_LOG` overrides the `info`
/// default.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
