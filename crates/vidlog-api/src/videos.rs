//! Handlers for `/videos` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/videos` | Materialised views, newest first |
//! | `POST`   | `/videos` | Body: [`CreateBody`]; returns 201 + view |
//! | `GET`    | `/videos/:id` | 404 if not found |
//! | `PATCH`  | `/videos/:id` | Body: a field set; merged with `source = manual` |
//! | `DELETE` | `/videos/:id` | 204, or 404 if not found |
//! | `GET`    | `/videos/:id/audit` | Every change to the video, its manual fields and metrics rows |

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use vidlog_core::{
  audit::{AuditLogEntry, AuditQuery},
  field::{FieldSet, Source},
  oracle::ExtractionOracle,
  reconcile::{MergeReport, MergeRequest, Reconciler},
  store::TrackerStore,
  video::{NewVideo, VideoView},
};

use crate::{ApiState, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /videos`
pub async fn list<S, O>(
  State(state): State<ApiState<S, O>>,
) -> Result<Json<Vec<VideoView>>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  Ok(Json(materialize_all(&*state.store).await?))
}

pub(crate) async fn materialize_all<S: TrackerStore>(
  store: &S,
) -> Result<Vec<VideoView>, ApiError> {
  let videos = store.list_videos().await.map_err(ApiError::store)?;
  let mut views = Vec::with_capacity(videos.len());
  for video in videos {
    // Skip a video deleted between the listing and now.
    if let Some(view) = store
      .materialize(video.video_id)
      .await
      .map_err(ApiError::store)?
    {
      views.push(view);
    }
  }
  Ok(views)
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /videos`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  #[serde(flatten)]
  pub video:  NewVideo,
  /// Initial values, merged with `source = manual` right after creation.
  #[serde(default)]
  pub fields: FieldSet,
}

/// `POST /videos`: returns 201 + the materialised view.
pub async fn create<S, O>(
  State(state): State<ApiState<S, O>>,
  headers: HeaderMap,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  if body.video.title.trim().is_empty() {
    return Err(ApiError::BadRequest("title must not be empty".into()));
  }
  let actor = state.actor(&headers);
  let video = state
    .store
    .create_video(body.video)
    .await
    .map_err(ApiError::store)?;

  if !body.fields.is_empty() {
    Reconciler::new(&*state.store, state.settings.date_order)
      .merge(MergeRequest {
        video_id: video.video_id,
        fields:   &body.fields,
        source:   Source::Manual,
        actor_id: &actor,
        log_id:   None,
      })
      .await?;
  }

  let view = state
    .store
    .materialize(video.video_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("video {} not found", video.video_id)))?;
  Ok((StatusCode::CREATED, Json(view)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /videos/:id`
pub async fn get_one<S, O>(
  State(state): State<ApiState<S, O>>,
  Path(id): Path<Uuid>,
) -> Result<Json<VideoView>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let view = state
    .store
    .materialize(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("video {id} not found")))?;
  Ok(Json(view))
}

// ─── Edit ────────────────────────────────────────────────────────────────────

/// `PATCH /videos/:id`: body is a field set, e.g.
/// `{"manual": {"hook": "..."}, "metrics": {"tiktok": {"views": "12k"}}}`.
pub async fn edit<S, O>(
  State(state): State<ApiState<S, O>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(fields): Json<FieldSet>,
) -> Result<Json<MergeReport>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let actor = state.actor(&headers);
  let report = Reconciler::new(&*state.store, state.settings.date_order)
    .merge(MergeRequest {
      video_id: id,
      fields:   &fields,
      source:   Source::Manual,
      actor_id: &actor,
      log_id:   None,
    })
    .await?;
  Ok(Json(report))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /videos/:id`
pub async fn delete_one<S, O>(
  State(state): State<ApiState<S, O>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let deleted = state.store.delete_video(id).await.map_err(ApiError::store)?;
  if !deleted {
    return Err(ApiError::NotFound(format!("video {id} not found")));
  }
  tracing::info!(video_id = %id, "video deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Audit trail ─────────────────────────────────────────────────────────────

/// `GET /videos/:id/audit`
pub async fn audit_trail<S, O>(
  State(state): State<ApiState<S, O>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let store = &*state.store;
  store
    .get_video(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("video {id} not found")))?;

  let mut entity_ids = vec![id];
  entity_ids.extend(
    store
      .list_metrics(id)
      .await
      .map_err(ApiError::store)?
      .into_iter()
      .map(|m| m.metrics_id),
  );
  let query = AuditQuery { entity_ids, ..Default::default() };
  let entries = store.list_audit(&query).await.map_err(ApiError::store)?;
  Ok(Json(entries))
}
