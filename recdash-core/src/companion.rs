//! Companion actions and product telemetry.
//!
//! Accepted remote-control actions are kept in a JSON ledger keyed by
//! execution id; every action and telemetry event is also appended to an
//! NDJSON log under the telemetry directory.
//!
//! ```text
//! ~/teams_recorder/.companion/state.json      { "<execution id>": ActionRecord, ... }
//! ~/teams_recorder/.telemetry/actions.ndjson  one ActionRecord per line
//! ~/teams_recorder/.telemetry/events.ndjson   one EventPayload per line
//! ```

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CompanionError;
use crate::settings::Settings;

pub const WORKSPACE_NAME: &str = "teams_recorder";
pub const REMOTE_CONTROL_FLAG: &str = "enable_teams_recorder_remote_control";
/// JSON object of flag name → boolean, consulted before per-flag variables.
pub const FEATURE_FLAGS_VAR: &str = "PRODUCT_CORE_FEATURE_FLAGS";

pub const SUPPORTED_ACTIONS: [&str; 6] = [
    "start_recording",
    "stop_recording",
    "retry_post_process",
    "pause_detector",
    "resume_detector",
    "acknowledge_incident",
];

pub const EVENT_NAMES: [&str; 7] = [
    "session_started",
    "onboarding_completed",
    "first_value_completed",
    "feature_engaged",
    "purchase_or_upgrade_initiated",
    "error_shown",
    "session_ended",
];

pub const RECOMMENDED_ACTIONS: [&str; 2] = ["retry_post_process", "acknowledge_incident"];

const ENTRY_SURFACE: &str = "companion_action";
const PLATFORM: &str = "companion_api";
const USER_ID_HASH: &str = "companion";
const ACCEPTED: &str = "accepted";
const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Ledger contents, keyed by execution id. Entries are kept as raw JSON so
/// records written by other tools survive a rewrite untouched.
pub type Ledger = Map<String, Value>;

// ---------------------------------------------------------------------------
// Requests and records
// ---------------------------------------------------------------------------

/// Body of `POST /api/companion/action`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionRequest {
    pub workspace_name: String,
    pub action_type: String,
    pub target_id: String,
    pub requested_by: String,
    pub requested_at_utc: String,
}

impl ActionRequest {
    /// Field rules beyond "present and a string".
    pub fn validate(&self) -> Result<(), CompanionError> {
        if self.workspace_name != WORKSPACE_NAME {
            return Err(CompanionError::InvalidRequest(format!(
                "workspace_name must be \"{WORKSPACE_NAME}\""
            )));
        }
        let fields = [
            ("action_type", &self.action_type),
            ("target_id", &self.target_id),
            ("requested_by", &self.requested_by),
            ("requested_at_utc", &self.requested_at_utc),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                return Err(CompanionError::InvalidRequest(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(())
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_ACTIONS.contains(&self.action_type.as_str())
    }
}

/// One accepted action, as stored in the ledger and the action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub execution_id: String,
    pub workspace_name: String,
    pub action_type: String,
    pub target_id: String,
    pub requested_by: String,
    pub requested_at_utc: String,
    pub accepted_at_utc: String,
    pub status: String,
}

impl ActionRecord {
    pub fn status_url(&self) -> String {
        format!("/api/companion/status/{}", self.execution_id)
    }
}

/// A product telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub event_name: String,
    pub workspace_name: String,
    pub user_id_hash: String,
    pub session_id: String,
    pub platform: String,
    pub timestamp_utc: String,
    pub properties: Map<String, Value>,
    /// Unknown top-level keys are logged as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventPayload {
    /// Accept an externally supplied event. Every required key must be
    /// present with the right JSON type, the workspace must match and the
    /// event name must be a known one.
    pub fn from_value(value: Value) -> Result<Self, CompanionError> {
        let event: EventPayload =
            serde_json::from_value(value).map_err(|_| CompanionError::InvalidEvent)?;
        if event.workspace_name != WORKSPACE_NAME
            || !EVENT_NAMES.contains(&event.event_name.as_str())
        {
            return Err(CompanionError::InvalidEvent);
        }
        Ok(event)
    }

    /// Event emitted by the companion surface itself.
    fn companion(
        name: &str,
        session_id: &str,
        at: &str,
        mut properties: Map<String, Value>,
    ) -> Self {
        properties.insert("entry_surface".into(), ENTRY_SURFACE.into());
        properties.insert("release_version".into(), env!("CARGO_PKG_VERSION").into());
        properties.insert("build_channel".into(), build_channel().into());
        Self {
            event_name: name.to_string(),
            workspace_name: WORKSPACE_NAME.to_string(),
            user_id_hash: USER_ID_HASH.to_string(),
            session_id: session_id.to_string(),
            platform: PLATFORM.to_string(),
            timestamp_utc: at.to_string(),
            properties,
            extra: Map::new(),
        }
    }
}

/// `GET /api/companion/summary` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanionSummary {
    pub workspace_name: &'static str,
    pub pending_actions: Vec<Value>,
    pub pending_action_count: usize,
    pub return_to_pending_action: Option<Value>,
    pub recommended_actions: [&'static str; 2],
    pub generated_at_utc: String,
}

// ---------------------------------------------------------------------------
// Feature flag
// ---------------------------------------------------------------------------

/// Resolve a boolean feature flag through `env`.
///
/// A boolean under `flag` in [`FEATURE_FLAGS_VAR`] wins. Otherwise the
/// first recognisable switch among `flag`, `FLAG` and `FLAG_FLAG` decides.
/// Anything else leaves the flag off.
pub fn feature_flag_enabled(flag: &str, env: impl Fn(&str) -> Option<String>) -> bool {
    if let Some(payload) = env(FEATURE_FLAGS_VAR) {
        match serde_json::from_str::<Value>(&payload) {
            Ok(Value::Object(flags)) => {
                if let Some(Value::Bool(enabled)) = flags.get(flag) {
                    return *enabled;
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(error = %err, "ignoring malformed feature flag payload");
            }
        }
    }

    let upper = flag.to_uppercase();
    [flag.to_string(), upper.clone(), format!("FLAG_{upper}")]
        .iter()
        .find_map(|name| env(name).and_then(|value| parse_switch(&value)))
        .unwrap_or(false)
}

/// Whether remote-control actions are accepted, read from the process environment.
pub fn remote_control_enabled() -> bool {
    feature_flag_enabled(REMOTE_CONTROL_FLAG, |name| std::env::var(name).ok())
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// File-backed ledger and telemetry logs.
#[derive(Debug)]
pub struct CompanionStore {
    state_file: PathBuf,
    telemetry_dir: PathBuf,
    writes: Mutex<()>,
}

impl CompanionStore {
    pub fn new(state_file: impl Into<PathBuf>, telemetry_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            telemetry_dir: telemetry_dir.into(),
            writes: Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.companion_state_file, &settings.telemetry_dir)
    }

    pub fn events_log(&self) -> PathBuf {
        self.telemetry_dir.join("events.ndjson")
    }

    pub fn actions_log(&self) -> PathBuf {
        self.telemetry_dir.join("actions.ndjson")
    }

    /// Current ledger. Missing, unreadable or non-object files read as empty.
    pub fn read_ledger(&self) -> Ledger {
        let raw = match std::fs::read_to_string(&self.state_file) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    tracing::debug!(
                        path = %self.state_file.display(),
                        error = %err,
                        "ledger unreadable"
                    );
                }
                return Ledger::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(Value::Object(ledger)) => ledger,
            _ => {
                tracing::debug!(path = %self.state_file.display(), "ledger is not a JSON object");
                Ledger::new()
            }
        }
    }

    pub fn lookup(&self, execution_id: &str) -> Option<Value> {
        self.read_ledger()
            .remove(execution_id)
            .filter(|entry| !entry.is_null())
    }

    /// Actions still waiting to run, oldest execution id first.
    pub fn summary(&self) -> CompanionSummary {
        let pending: Vec<Value> = self
            .read_ledger()
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(is_pending)
            .collect();
        CompanionSummary {
            workspace_name: WORKSPACE_NAME,
            pending_action_count: pending.len(),
            return_to_pending_action: pending.first().cloned(),
            pending_actions: pending,
            recommended_actions: RECOMMENDED_ACTIONS,
            generated_at_utc: now_utc(),
        }
    }

    /// Accept a validated, supported request: ledger entry, action log line
    /// and the engagement events. The first action ever recorded also emits
    /// the onboarding events.
    pub fn record_action(&self, request: &ActionRequest) -> Result<ActionRecord, CompanionError> {
        let _guard = self.writes.lock().unwrap_or_else(PoisonError::into_inner);

        let record = ActionRecord {
            execution_id: execution_id(),
            workspace_name: request.workspace_name.clone(),
            action_type: request.action_type.clone(),
            target_id: request.target_id.clone(),
            requested_by: request.requested_by.clone(),
            requested_at_utc: request.requested_at_utc.clone(),
            accepted_at_utc: now_utc(),
            status: ACCEPTED.to_string(),
        };
        let first_action = !self.has_actions();

        let mut ledger = self.read_ledger();
        ledger.insert(record.execution_id.clone(), serde_json::to_value(&record)?);
        self.write_ledger(&ledger)?;
        append_line(&self.actions_log(), &record)?;

        let id = record.execution_id.as_str();
        let at = record.accepted_at_utc.as_str();
        if first_action {
            for (name, key, value) in [
                ("session_started", "entry", ENTRY_SURFACE),
                ("onboarding_completed", "flow", "first_companion_action"),
                ("first_value_completed", "value_surface", "first_companion_action"),
            ] {
                let properties = Map::from_iter([(key.to_string(), Value::from(value))]);
                let event = EventPayload::companion(name, id, at, properties);
                append_line(&self.events_log(), &event)?;
            }
        }
        let feature = Value::from(record.action_type.as_str());
        let properties = Map::from_iter([("feature".to_string(), feature)]);
        append_line(
            &self.events_log(),
            &EventPayload::companion("feature_engaged", id, at, properties),
        )?;

        tracing::info!(
            execution_id = id,
            action = %record.action_type,
            first_action,
            "companion action accepted"
        );
        Ok(record)
    }

    /// Log an `error_shown` event for an action refused by the feature flag.
    pub fn reject_disabled(&self, action_type: &str) -> Result<(), CompanionError> {
        let properties = Map::from_iter([
            ("source".to_string(), Value::from(ENTRY_SURFACE)),
            ("message".to_string(), Value::from("feature_flag_disabled")),
            ("flag_key".to_string(), Value::from(REMOTE_CONTROL_FLAG)),
            ("requested_action".to_string(), Value::from(action_type)),
        ]);
        let event =
            EventPayload::companion("error_shown", &execution_id(), &now_utc(), properties);
        tracing::warn!(
            action = action_type,
            flag = REMOTE_CONTROL_FLAG,
            "companion action refused"
        );
        self.append_event(&event)
    }

    pub fn append_event(&self, event: &EventPayload) -> Result<(), CompanionError> {
        let _guard = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        append_line(&self.events_log(), event)
    }

    /// The telemetry directory is usable when it is a directory or does not
    /// exist yet; it is created on first write.
    pub fn check_telemetry(&self) -> Result<(), CompanionError> {
        match std::fs::metadata(&self.telemetry_dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(io_err(
                &self.telemetry_dir,
                std::io::Error::new(ErrorKind::Other, "not a directory"),
            )),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(&self.telemetry_dir, err)),
        }
    }

    fn has_actions(&self) -> bool {
        std::fs::read_to_string(self.actions_log())
            .map(|raw| raw.lines().any(|line| !line.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Pretty JSON with a trailing newline, swapped in through a `.tmp` sibling.
    fn write_ledger(&self, ledger: &Ledger) -> Result<(), CompanionError> {
        ensure_parent(&self.state_file)?;
        let mut text = serde_json::to_string_pretty(ledger)?;
        text.push('\n');
        let tmp_path = self.state_file.with_extension("json.tmp");
        std::fs::write(&tmp_path, text).map_err(|e| io_err(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.state_file).map_err(|e| io_err(&self.state_file, e))
    }
}

fn is_pending(entry: &Value) -> bool {
    entry
        .get("status")
        .map(|status| match status {
            Value::String(s) => s.to_lowercase() == ACCEPTED,
            Value::Null => false,
            other => other.to_string().to_lowercase() == ACCEPTED,
        })
        .unwrap_or(false)
}

fn append_line<T: Serialize>(path: &Path, value: &T) -> Result<(), CompanionError> {
    ensure_parent(path)?;
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    file.write_all(line.as_bytes()).map_err(|e| io_err(path, e))
}

fn ensure_parent(path: &Path) -> Result<(), CompanionError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e)),
        None => Ok(()),
    }
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CompanionError {
    CompanionError::Io {
        path: path.into(),
        source,
    }
}

/// `<unix millis>_<8 base36 chars>`.
pub fn execution_id() -> String {
    let suffix: String = (0..8)
        .map(|_| ID_ALPHABET[fastrand::usize(..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}_{suffix}", Utc::now().timestamp_millis())
}

fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn build_channel() -> &'static str {
    if cfg!(debug_assertions) {
        "development"
    } else {
        "production"
    }
}
