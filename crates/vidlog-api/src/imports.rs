//! Handlers for `/imports` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/imports` | Body: raw CSV; optional `?file_name=...&platform=...` |
//! | `GET`  | `/imports/latest` | The highest-version batch; 404 before the first upload |
//! | `GET`  | `/imports/:id/rows` | Raw rows of one batch, in sheet order |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use vidlog_core::{
  import::{ImportBatch, ImportOptions, ImportRow, import_spreadsheet},
  oracle::ExtractionOracle,
  store::TrackerStore,
  video::Platform,
};

use crate::{ApiState, error::ApiError};

// ─── Upload ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UploadParams {
  pub file_name: Option<String>,
  /// Loose platform name used for rows without a platform column.
  pub platform:  Option<String>,
}

/// `POST /imports`: returns 201 + the import report.
pub async fn upload<S, O>(
  State(state): State<ApiState<S, O>>,
  Query(params): Query<UploadParams>,
  headers: HeaderMap,
  body: String,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let sheet = vidlog_sheet::parse(&body)?;
  let options = ImportOptions {
    file_name:        params.file_name,
    content_sha256:   hex::encode(Sha256::digest(body.as_bytes())),
    default_platform: params.platform.as_deref().and_then(Platform::parse_loose),
    actor_id:         state.actor(&headers),
  };

  let report = import_spreadsheet(
    &*state.store,
    &*state.extractor,
    &state.settings,
    &sheet,
    options,
  )
  .await?;
  Ok((StatusCode::CREATED, Json(report)))
}

// ─── Latest ──────────────────────────────────────────────────────────────────

/// `GET /imports/latest`
pub async fn latest<S, O>(
  State(state): State<ApiState<S, O>>,
) -> Result<Json<ImportBatch>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let batch = state
    .store
    .latest_import_batch()
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("no spreadsheet has been imported".into()))?;
  Ok(Json(batch))
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// `GET /imports/:id/rows`
pub async fn rows<S, O>(
  State(state): State<ApiState<S, O>>,
  Path(batch_id): Path<Uuid>,
) -> Result<Json<Vec<ImportRow>>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let rows = state
    .store
    .list_import_rows(batch_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rows))
}
