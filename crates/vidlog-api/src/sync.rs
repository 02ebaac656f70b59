//! Handler for `POST /sync`: merge platform records by external id.

use axum::{
  Json,
  extract::State,
  http::HeaderMap,
};
use vidlog_core::{
  oracle::ExtractionOracle,
  store::TrackerStore,
  sync::{SyncReport, SyncedVideo, sync_videos},
};

use crate::{ApiState, error::ApiError};

/// `POST /sync`: body is a JSON array of [`SyncedVideo`] records.
pub async fn handler<S, O>(
  State(state): State<ApiState<S, O>>,
  headers: HeaderMap,
  Json(records): Json<Vec<SyncedVideo>>,
) -> Result<Json<SyncReport>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let actor = state.actor(&headers);
  let report = sync_videos(&*state.store, state.settings.date_order, records, &actor).await?;
  Ok(Json(report))
}
