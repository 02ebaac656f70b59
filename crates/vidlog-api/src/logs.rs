//! Handlers for `/logs` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/logs` | Body: [`SubmitBody`]; returns 202 + the `processing` entry |
//! | `GET`  | `/logs` | Optional `?status=...&limit=...`; newest first |
//! | `GET`  | `/logs/:id` | Entry plus its latest transcript |
//! | `POST` | `/logs/:id/associate` | Body: `{"videoId":"..."}`; 409 unless `needs_association` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vidlog_core::{
  ingest::Pipeline,
  log::{LogEntry, LogKind, LogQuery, LogStatus, NewLogEntry, Transcript},
  oracle::ExtractionOracle,
  reconcile::MergeReport,
  store::TrackerStore,
};

use crate::{ApiState, error::ApiError};

// ─── Submit ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
  #[serde(default = "default_kind")]
  pub kind:      LogKind,
  pub text:      Option<String>,
  /// Reference to a stored recording. Voice entries still need `text`
  /// (the transcription) to be processed.
  pub audio_ref: Option<String>,
}

fn default_kind() -> LogKind { LogKind::Text }

/// `POST /logs`
pub async fn submit<S, O>(
  State(state): State<ApiState<S, O>>,
  headers: HeaderMap,
  Json(body): Json<SubmitBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let has_text = body.text.as_deref().is_some_and(|t| !t.trim().is_empty());
  if !has_text && body.audio_ref.is_none() {
    return Err(ApiError::BadRequest("a log needs text or an audio reference".into()));
  }

  let entry = state
    .store
    .create_log_entry(NewLogEntry {
      kind:      body.kind,
      raw_text:  body.text,
      audio_ref: body.audio_ref,
      actor_id:  state.actor(&headers),
    })
    .await
    .map_err(ApiError::store)?;
  tracing::info!(log_id = %entry.log_id, kind = %entry.kind, "log submitted");

  state.queue.enqueue(entry.log_id);
  Ok((StatusCode::ACCEPTED, Json(entry)))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<LogStatus>,
  pub limit:  Option<usize>,
}

/// `GET /logs[?status=<status>][&limit=<n>]`
pub async fn list<S, O>(
  State(state): State<ApiState<S, O>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<LogEntry>>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let entries = state
    .store
    .list_log_entries(LogQuery { status: params.status, limit: params.limit })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LogDetail {
  #[serde(flatten)]
  pub entry:      LogEntry,
  pub transcript: Option<Transcript>,
}

/// `GET /logs/:id`
pub async fn get_one<S, O>(
  State(state): State<ApiState<S, O>>,
  Path(id): Path<Uuid>,
) -> Result<Json<LogDetail>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let entry = state
    .store
    .get_log_entry(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("log entry {id} not found")))?;
  let transcript = state
    .store
    .latest_transcript(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(LogDetail { entry, transcript }))
}

// ─── Associate ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateBody {
  pub video_id: Uuid,
}

/// `POST /logs/:id/associate`
pub async fn associate<S, O>(
  State(state): State<ApiState<S, O>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<AssociateBody>,
) -> Result<Json<MergeReport>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let actor = state.actor(&headers);
  let report = Pipeline::new(&*state.store, &*state.extractor, &state.settings)
    .associate(id, body.video_id, &actor)
    .await?;
  Ok(Json(report))
}
