//! Route handlers.

use std::convert::Infallible;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::AsyncReadExt;

use recdash_core::companion::{ActionRequest, EventPayload, REMOTE_CONTROL_FLAG, SUPPORTED_ACTIONS};
use recdash_core::{
    recordings, shell, store, CompanionSummary, ConfigValues, Recording, SnapshotOptions,
};
use recdash_stream::{reader, StreamEvent};

use crate::control::{self, ServiceAction};
use crate::error::ApiError;
use crate::server::AppState;

const SERVICE_NAME: &str = "teams_recorder_dashboard";
const FILE_CHUNK: usize = 64 * 1024;
const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Run blocking filesystem work off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work).await?)
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// `?lines=&bytes=` kept as raw text; parsing is lenient.
#[derive(Debug, Default, Deserialize)]
pub struct SnapshotQuery {
    lines: Option<String>,
    bytes: Option<String>,
}

impl SnapshotQuery {
    fn options(&self) -> SnapshotOptions {
        SnapshotOptions::from_query(self.lines.as_deref(), self.bytes.as_deref())
    }
}

pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Response, ApiError> {
    let options = query.options();
    let source = state.snapshots.clone();
    let snapshot = blocking(move || source.read_snapshot(options))
        .await?
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(snapshot).into_response())
}

pub async fn status_stream(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> impl IntoResponse {
    let events = state
        .stream
        .subscribe(query.options(), state.shutdown.subscribe());
    tracing::debug!("snapshot stream opened");

    (
        [
            (CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform")),
            (CONNECTION, HeaderValue::from_static("keep-alive")),
            (X_ACCEL_BUFFERING, HeaderValue::from_static("no")),
        ],
        Sse::new(sse_events(events)),
    )
}

fn sse_events(
    events: tokio::sync::mpsc::Receiver<StreamEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        Some((Ok(to_sse(event)), events))
    })
}

fn to_sse(event: StreamEvent) -> Event {
    let Some(name) = event.name() else {
        return Event::default().comment("heartbeat");
    };
    match event.data() {
        Ok(Some(data)) => Event::default().event(name).data(data),
        Ok(None) => Event::default().event(name),
        Err(err) => Event::default()
            .event("stream-error")
            .data(json!({ "message": err.to_string() }).to_string()),
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ConfigDocument {
    content: String,
    values: ConfigValues,
}

pub async fn read_config(State(state): State<AppState>) -> Result<Json<ConfigDocument>, ApiError> {
    let path = state.settings.config_file.clone();
    let content = blocking(move || store::read_text(&path)).await?.map_err(|err| {
        tracing::error!(error = %err, "config read failed");
        ApiError::Internal("Failed to read config".to_string())
    })?;
    let values = shell::parse(&content);
    Ok(Json(ConfigDocument { content, values }))
}

/// Either the raw editor text or structured values.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SaveConfig {
    Content { content: String },
    Values { values: ConfigValues },
}

pub async fn save_config(
    State(state): State<AppState>,
    body: Result<Json<SaveConfig>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let path = state.settings.config_file.clone();

    let content = match request {
        SaveConfig::Content { content } => {
            let written = content.clone();
            blocking(move || store::save_text(&path, &content)).await??;
            written
        }
        SaveConfig::Values { values } => {
            blocking(move || store::save_values(&path, &values)).await??
        }
    };
    tracing::info!(path = %state.settings.config_file.display(), "config saved");
    Ok(Json(json!({ "message": "Saved", "content": content })))
}

// ---------------------------------------------------------------------------
// Recordings
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingList {
    export_folder: String,
    recordings: Vec<Recording>,
}

pub async fn list_recordings(
    State(state): State<AppState>,
) -> Result<Json<RecordingList>, ApiError> {
    let settings = state.settings.clone();
    let (folder, recordings) = blocking(move || {
        let folder = store::resolve_export_folder(&settings);
        let recordings = recordings::list(&folder);
        (folder, recordings)
    })
    .await?;

    Ok(Json(RecordingList {
        export_folder: folder.display().to_string(),
        recordings: recordings?,
    }))
}

pub async fn fetch_recording(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let settings = state.settings.clone();
    let lookup = name.clone();
    let (path, kind) = blocking(move || {
        let folder = store::resolve_export_folder(&settings);
        recordings::resolve(&folder, &lookup)
    })
    .await??;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::NotFound("Recording not found".to_string()))?;
    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{name}\""))
        .map_err(|_| ApiError::BadRequest("Invalid recording name".to_string()))?;

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(kind.content_type())),
            (CONTENT_DISPOSITION, disposition),
            (CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        Body::from_stream(file_chunks(file)),
    )
        .into_response())
}

fn file_chunks(file: tokio::fs::File) -> impl Stream<Item = std::io::Result<Bytes>> {
    stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; FILE_CHUNK];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), file)))
    })
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    action: String,
}

pub async fn control(
    State(state): State<AppState>,
    body: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let action: ServiceAction = request.action.parse()?;

    let launchctl = state.launchctl.clone();
    let plist = state.settings.launch_agent_plist.clone();
    blocking(move || control::perform(&*launchctl, action, &plist)).await??;

    Ok(Json(json!({ "message": action.confirmation() })))
}

// ---------------------------------------------------------------------------
// Companion
// ---------------------------------------------------------------------------

pub async fn companion_action(
    State(state): State<AppState>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    request.validate()?;

    if !request.is_supported() {
        let body = json!({
            "accepted": false,
            "error": "unsupported_action",
            "supported_actions": SUPPORTED_ACTIONS,
        });
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    if !state.remote_control {
        let companion = state.companion.clone();
        let action = request.action_type.clone();
        blocking(move || companion.reject_disabled(&action)).await??;
        let body = json!({
            "accepted": false,
            "error": "feature_flag_disabled",
            "flag_key": REMOTE_CONTROL_FLAG,
        });
        return Ok((StatusCode::FORBIDDEN, Json(body)).into_response());
    }

    let companion = state.companion.clone();
    let record = blocking(move || companion.record_action(&request)).await??;
    Ok(Json(json!({
        "accepted": true,
        "execution_id": record.execution_id,
        "status_url": record.status_url(),
    }))
    .into_response())
}

pub async fn companion_summary(
    State(state): State<AppState>,
) -> Result<Json<CompanionSummary>, ApiError> {
    let companion = state.companion.clone();
    Ok(Json(blocking(move || companion.summary()).await?))
}

pub async fn companion_status(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let companion = state.companion.clone();
    blocking(move || companion.lookup(&execution_id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("execution_not_found".to_string()))
}

/// Telemetry ingest. Any malformed body answers the same schema error.
pub async fn ingest_event(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let event = match body.map(|Json(value)| EventPayload::from_value(value)) {
        Ok(Ok(event)) => event,
        _ => {
            let body = json!({ "accepted": false, "message": "invalid_event_schema" });
            return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
        }
    };

    let companion = state.companion.clone();
    blocking(move || companion.append_event(&event)).await??;
    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": true }))).into_response())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DependencyHealth {
    name: &'static str,
    status: &'static str,
    latency_ms: u64,
}

fn dependency(name: &'static str, started: Instant, healthy: bool) -> DependencyHealth {
    DependencyHealth {
        name,
        status: if healthy { "ok" } else { "degraded" },
        latency_ms: started.elapsed().as_millis() as u64,
    }
}

pub async fn health(State(state): State<AppState>) -> Result<Response, ApiError> {
    let settings = state.settings.clone();
    let companion = state.companion.clone();
    let dependencies = blocking(move || {
        let started = Instant::now();
        let snapshot = dependency(
            "watcher_status_snapshot",
            started,
            reader::try_read_status(&settings.status_file).is_ok(),
        );

        let started = Instant::now();
        let telemetry = dependency(
            "local_telemetry_store",
            started,
            companion.check_telemetry().is_ok(),
        );

        let started = Instant::now();
        let config = dependency(
            "watcher_config",
            started,
            store::read_text(&settings.config_file).is_ok(),
        );
        vec![snapshot, telemetry, config]
    })
    .await?;

    Ok(Json(json!({
        "status": "ok",
        "service_name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp_utc": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "dependencies": dependencies,
    }))
    .into_response())
}
