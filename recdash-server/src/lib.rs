//! Local HTTP surface of the recording dashboard.
//!
//! Routes live in [`handlers`]; [`server::DashboardServer`] wires them into
//! an Axum router with the loopback guard from [`guard`].

pub mod control;
mod error;
pub mod guard;
pub mod handlers;
pub mod server;

pub use control::{ControlError, Launchctl, ServiceAction, SystemLaunchctl};
pub use error::ApiError;
pub use server::{init_tracing, AppState, DashboardServer, DEFAULT_BIND};
