//! Start/stop of the background watcher through `launchctl`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Launchctl(String),
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ControlError {
    ControlError::Io {
        path: path.into(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl FromStr for ServiceAction {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ServiceAction::Start),
            "stop" => Ok(ServiceAction::Stop),
            "restart" => Ok(ServiceAction::Restart),
            other => Err(ControlError::UnknownAction(other.to_string())),
        }
    }
}

impl ServiceAction {
    /// Confirmation shown to the user, e.g. `Service stopped`.
    pub fn confirmation(self) -> &'static str {
        match self {
            ServiceAction::Start => "Service started",
            ServiceAction::Stop => "Service stopped",
            ServiceAction::Restart => "Service restarted",
        }
    }
}

/// Runs one `launchctl` invocation.
pub trait Launchctl: Send + Sync + 'static {
    fn run(&self, args: &[&str]) -> Result<(), ControlError>;
}

/// The real `launchctl` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLaunchctl;

impl Launchctl for SystemLaunchctl {
    fn run(&self, args: &[&str]) -> Result<(), ControlError> {
        let output = Command::new("launchctl")
            .args(args)
            .output()
            .map_err(|e| io_err("launchctl", e))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Err(ControlError::Launchctl(format!(
            "launchctl {} failed (status {}): {} {}",
            args.join(" "),
            output.status,
            stdout,
            stderr
        )))
    }
}

/// Apply `action` to the launch agent at `plist`.
///
/// Start and restart unload first, ignoring failure (the agent may not be
/// loaded), then load. Stop only unloads.
pub fn perform(
    ctl: &dyn Launchctl,
    action: ServiceAction,
    plist: &Path,
) -> Result<(), ControlError> {
    let plist = plist.to_string_lossy();
    let plist: &str = &plist;
    match action {
        ServiceAction::Start | ServiceAction::Restart => {
            if let Err(err) = ctl.run(&["unload", plist]) {
                tracing::debug!(error = %err, "unload before load failed; continuing");
            }
            ctl.run(&["load", plist])?;
        }
        ServiceAction::Stop => ctl.run(&["unload", plist])?,
    }
    tracing::info!(action = ?action, plist = %plist, "watcher service updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records invocations; fails any whose first argument is listed.
    #[derive(Default)]
    struct RecordingLaunchctl {
        calls: Mutex<Vec<String>>,
        failing: Vec<&'static str>,
    }

    impl Launchctl for RecordingLaunchctl {
        fn run(&self, args: &[&str]) -> Result<(), ControlError> {
            self.calls.lock().expect("lock").push(args.join(" "));
            if self.failing.contains(&args[0]) {
                return Err(ControlError::Launchctl(format!("{} failed", args[0])));
            }
            Ok(())
        }
    }

    const PLIST: &str = "/Users/tester/Library/LaunchAgents/com.teams-voice-record.plist";

    #[test]
    fn actions_parse_and_reject_unknown() {
        assert_eq!("restart".parse::<ServiceAction>().expect("parse"), ServiceAction::Restart);
        let err = "reboot".parse::<ServiceAction>().expect_err("unknown");
        assert_eq!(err.to_string(), "Unknown action: reboot");
    }

    #[test]
    fn start_unloads_then_loads_even_if_unload_fails() {
        let ctl = RecordingLaunchctl {
            failing: vec!["unload"],
            ..RecordingLaunchctl::default()
        };
        perform(&ctl, ServiceAction::Start, Path::new(PLIST)).expect("start");
        assert_eq!(
            *ctl.calls.lock().expect("lock"),
            vec![format!("unload {PLIST}"), format!("load {PLIST}")]
        );
    }

    #[test]
    fn stop_only_unloads_and_reports_failure() {
        let ctl = RecordingLaunchctl {
            failing: vec!["unload"],
            ..RecordingLaunchctl::default()
        };
        let err = perform(&ctl, ServiceAction::Stop, Path::new(PLIST)).expect_err("stop fails");
        assert_eq!(err.to_string(), "unload failed");
        assert_eq!(ctl.calls.lock().expect("lock").len(), 1);
    }

    #[test]
    fn load_failure_surfaces() {
        let ctl = RecordingLaunchctl {
            failing: vec!["load"],
            ..RecordingLaunchctl::default()
        };
        assert!(perform(&ctl, ServiceAction::Restart, Path::new(PLIST)).is_err());
    }
}
