//! Handler for `GET /export.csv`.

use axum::{
  extract::State,
  http::header,
  response::IntoResponse,
};
use vidlog_core::{oracle::ExtractionOracle, store::TrackerStore};

use crate::{ApiState, error::ApiError, videos::materialize_all};

/// `GET /export.csv`: one row per video and platform.
pub async fn handler<S, O>(
  State(state): State<ApiState<S, O>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let views = materialize_all(&*state.store).await?;
  let csv = vidlog_sheet::export(&views);
  Ok((
    [
      (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
      (header::CONTENT_DISPOSITION, "attachment; filename=\"videos.csv\""),
    ],
    csv,
  ))
}
